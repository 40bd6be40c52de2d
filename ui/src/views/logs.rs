//! Logs view - live log display with search highlighting

use crate::app::LogViewerApp;
use eframe::egui;
use egui::text::LayoutJob;
use proxy_log_core::{LogEntry, LogLevel, ParsedDetail, SearchMatcher, SubscriptionState};
use std::ops::Range;

const HIGHLIGHT_BG: egui::Color32 = egui::Color32::from_rgb(255, 213, 79);

pub struct LogsView;

impl LogsView {
    pub fn show(app: &mut LogViewerApp, ui: &mut egui::Ui) {
        ui.heading("📝 Logs");
        ui.add_space(10.0);

        ui.horizontal(|ui| {
            let mut enabled = app.config.logs.enabled;
            if ui.checkbox(&mut enabled, "Enable").changed() {
                app.set_logging_enabled(enabled);
            }

            let mut level = app.logs_view.level;
            egui::ComboBox::from_id_salt("log_level")
                .selected_text(level.display_name())
                .show_ui(ui, |ui| {
                    for l in LogLevel::ALL {
                        ui.selectable_value(&mut level, l, l.display_name());
                    }
                });
            if level != app.logs_view.level {
                app.set_log_level(level);
            }

            if ui.button("🗑 Clear").clicked() {
                app.clear_logs(Some(app.logs_view.level));
            }
            if ui.button("🗑 Clear All").clicked() {
                app.clear_logs(None);
            }

            ui.separator();
            let (text, color) = match app.subscription_state() {
                SubscriptionState::Open { .. } => ("● Live", egui::Color32::from_rgb(34, 139, 34)),
                SubscriptionState::Closed { .. } => {
                    ("● Disconnected", egui::Color32::from_rgb(220, 20, 60))
                }
                SubscriptionState::Idle if app.config.connection_info().is_none() => {
                    ("○ No server configured", egui::Color32::GRAY)
                }
                SubscriptionState::Idle => ("○ Paused", egui::Color32::GRAY),
            };
            ui.colored_label(color, text);
        });

        ui.add_space(5.0);

        let filter = &mut app.logs_view.filter;
        ui.horizontal(|ui| {
            ui.add(
                egui::TextEdit::singleline(&mut filter.query)
                    .hint_text("Search logs")
                    .desired_width(320.0),
            );
            toggle(ui, &mut filter.match_case, "Aa", "Match case");
            toggle(ui, &mut filter.match_whole_word, "ab", "Match whole word");
            toggle(ui, &mut filter.use_regex, ".*", "Use regular expression");
        });

        let matcher = match app.logs_view.filter.compile() {
            Ok(matcher) => matcher,
            Err(e) => {
                ui.colored_label(egui::Color32::from_rgb(220, 20, 60), e.to_string());
                SearchMatcher::default()
            }
        };

        app.store.read(app.logs_view.level, |entries| {
            let visible = matcher.matching_indices(entries);

            ui.horizontal(|ui| {
                if matcher.is_active() {
                    ui.label(format!("{} of {} entries", visible.len(), entries.len()));
                } else {
                    ui.label(format!("{} entries", entries.len()));
                }
            });

            ui.add_space(10.0);

            if visible.is_empty() {
                ui.vertical_centered(|ui| {
                    ui.add_space(50.0);
                    if entries.is_empty() {
                        ui.label("No log entries yet.");
                    } else {
                        ui.label("No entries match the search.");
                    }
                });
                return;
            }

            // Every entry is two lines high, so only the rows in view are laid out
            let row_height = 2.0 * ui.spacing().interact_size.y + ui.spacing().item_spacing.y + 4.0;
            egui::ScrollArea::vertical()
                .auto_shrink([false; 2])
                .stick_to_bottom(true)
                .show_rows(ui, row_height, visible.len(), |ui, rows| {
                    for &index in &visible[rows] {
                        ui.vertical(|ui| {
                            ui.set_height(row_height);
                            show_entry(ui, &entries[index], &matcher);
                        });
                    }
                });
        });
    }
}

fn toggle(ui: &mut egui::Ui, value: &mut bool, label: &str, hint: &str) {
    if ui
        .selectable_label(*value, egui::RichText::new(label).monospace())
        .on_hover_text(hint)
        .clicked()
    {
        *value = !*value;
    }
}

fn show_entry(ui: &mut egui::Ui, entry: &LogEntry, matcher: &SearchMatcher) {
    ui.horizontal(|ui| {
        ui.label(
            egui::RichText::new(&entry.time)
                .color(egui::Color32::GRAY)
                .monospace(),
        );
        ui.label(
            egui::RichText::new(entry.kind.to_uppercase())
                .color(kind_color(&entry.kind_key()))
                .strong(),
        );
    });

    // A hit that spans fields, or lands in a hover-only one, shows the raw line
    match &entry.detail {
        Some(detail) if !matcher.is_active() || detail_has_hit(detail, matcher) => {
            show_detail(ui, detail, matcher)
        }
        _ => {
            let format = text_format(ui, ui.visuals().text_color());
            ui.add(egui::Label::new(highlighted(&entry.payload, matcher, format)).truncate());
        }
    }
}

/// Whether the search highlights anything in the fields of a detailed row
fn detail_has_hit(detail: &ParsedDetail, matcher: &SearchMatcher) -> bool {
    let parts = split_target(&detail.target);
    let shown: [&str; 7] = [
        detail.conn_type.as_str(),
        detail.process_name.as_deref().unwrap_or(&detail.source),
        &parts.sub_domain,
        &parts.top_domain,
        &parts.port,
        detail.match_detail.as_deref().unwrap_or(&detail.rule),
        &detail.using,
    ];
    shown
        .iter()
        .any(|field| !matcher.highlight_ranges(field).is_empty())
}

fn show_detail(ui: &mut egui::Ui, detail: &ParsedDetail, matcher: &SearchMatcher) {
    let text = ui.visuals().text_color();
    let weak = ui.visuals().weak_text_color();
    let strong = ui.visuals().strong_text_color();

    ui.horizontal(|ui| {
        egui::Frame::none()
            .stroke(egui::Stroke::new(1.0, weak))
            .rounding(6.0)
            .inner_margin(egui::Margin::symmetric(6.0, 0.0))
            .show(ui, |ui| {
                ui.label(highlighted(&detail.conn_type, matcher, text_format(ui, weak)));
            });

        // Source, or process name with the source on hover
        match &detail.process_name {
            Some(process) => {
                ui.label(highlighted(process, matcher, text_format(ui, text)))
                    .on_hover_text(detail.source.as_str());
            }
            None => {
                ui.label(highlighted(&detail.source, matcher, text_format(ui, text)));
            }
        }

        ui.label(egui::RichText::new("›").color(weak));

        let parts = split_target(&detail.target);
        let mut job = LayoutJob::default();
        append_highlighted(&mut job, &parts.sub_domain, matcher, text_format(ui, weak));
        append_highlighted(&mut job, &parts.top_domain, matcher, text_format(ui, strong));
        append_highlighted(&mut job, &parts.port, matcher, text_format(ui, weak));
        ui.label(job).on_hover_text(detail.target.as_str());

        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            ui.label(highlighted(&detail.using, matcher, text_format(ui, text)));
            match &detail.match_detail {
                Some(rule_detail) => {
                    ui.label(highlighted(rule_detail, matcher, text_format(ui, strong)))
                        .on_hover_text(detail.rule.as_str());
                }
                None => {
                    ui.label(highlighted(&detail.rule, matcher, text_format(ui, text)));
                }
            }
        });
    });
}

fn kind_color(kind: &str) -> egui::Color32 {
    match kind {
        "error" | "err" => egui::Color32::from_rgb(220, 20, 60),
        "warning" | "warn" => egui::Color32::from_rgb(255, 165, 0),
        "info" | "inf" => egui::Color32::from_rgb(100, 149, 237),
        _ => egui::Color32::GRAY,
    }
}

fn text_format(ui: &egui::Ui, color: egui::Color32) -> egui::TextFormat {
    egui::TextFormat {
        font_id: egui::TextStyle::Monospace.resolve(ui.style()),
        color,
        ..Default::default()
    }
}

fn highlighted(text: &str, matcher: &SearchMatcher, format: egui::TextFormat) -> LayoutJob {
    let mut job = LayoutJob::default();
    append_highlighted(&mut job, text, matcher, format);
    job
}

fn append_highlighted(
    job: &mut LayoutJob,
    text: &str,
    matcher: &SearchMatcher,
    format: egui::TextFormat,
) {
    for (segment, hit) in segments(text, &matcher.highlight_ranges(text)) {
        let mut segment_format = format.clone();
        if hit {
            segment_format.background = HIGHLIGHT_BG;
            segment_format.color = egui::Color32::BLACK;
        }
        job.append(segment, 0.0, segment_format);
    }
}

/// Split `text` into plain and matched pieces, in order
fn segments<'a>(text: &'a str, ranges: &[Range<usize>]) -> Vec<(&'a str, bool)> {
    let mut out = Vec::new();
    let mut cursor = 0;
    for range in ranges {
        if range.start > cursor {
            out.push((&text[cursor..range.start], false));
        }
        out.push((&text[range.clone()], true));
        cursor = range.end;
    }
    if cursor < text.len() {
        out.push((&text[cursor..], false));
    }
    out
}

/// Target address split for display: `www.` + `example.com` + `:443`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TargetParts {
    pub sub_domain: String,
    pub top_domain: String,
    pub port: String,
}

pub fn split_target(target: &str) -> TargetParts {
    let rest = target
        .strip_prefix("http://")
        .or_else(|| target.strip_prefix("https://"))
        .unwrap_or(target);
    let authority = rest.split('/').next().unwrap_or(rest);

    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port))
            if !port.is_empty()
                && port.chars().all(|c| c.is_ascii_digit())
                && (host.starts_with('[') || !host.contains(':')) =>
        {
            (host, format!(":{}", port))
        }
        _ => (authority, String::new()),
    };

    if host.starts_with('[') || is_ipv4(host) {
        return TargetParts {
            sub_domain: String::new(),
            top_domain: host.to_string(),
            port,
        };
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() > 2 {
        let split = labels.len() - 2;
        TargetParts {
            sub_domain: format!("{}.", labels[..split].join(".")),
            top_domain: labels[split..].join("."),
            port,
        }
    } else {
        TargetParts {
            sub_domain: String::new(),
            top_domain: host.to_string(),
            port,
        }
    }
}

fn is_ipv4(host: &str) -> bool {
    let octets: Vec<&str> = host.split('.').collect();
    octets.len() == 4
        && octets
            .iter()
            .all(|o| (1..=3).contains(&o.len()) && o.chars().all(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proxy_log_core::{parse_log_detail, LogFilter};

    #[test]
    fn test_split_domain_target() {
        let parts = split_target("www.google.com:443");
        assert_eq!(parts.sub_domain, "www.");
        assert_eq!(parts.top_domain, "google.com");
        assert_eq!(parts.port, ":443");

        let parts = split_target("a.b.example.co:80");
        assert_eq!(parts.sub_domain, "a.b.");
        assert_eq!(parts.top_domain, "example.co");
    }

    #[test]
    fn test_split_short_and_ip_targets() {
        assert_eq!(
            split_target("example.com:8080"),
            TargetParts {
                sub_domain: String::new(),
                top_domain: "example.com".into(),
                port: ":8080".into(),
            }
        );
        assert_eq!(
            split_target("192.168.1.10:53"),
            TargetParts {
                sub_domain: String::new(),
                top_domain: "192.168.1.10".into(),
                port: ":53".into(),
            }
        );
        assert_eq!(split_target("[2001:db8::1]:443").top_domain, "[2001:db8::1]");
        assert_eq!(split_target("localhost").port, "");
    }

    #[test]
    fn test_segments() {
        let text = "dial tcp to example.com";
        let matcher = LogFilter::new("example").compile().unwrap();
        let pieces = segments(text, &matcher.highlight_ranges(text));
        assert_eq!(
            pieces,
            vec![("dial tcp to ", false), ("example", true), (".com", false)]
        );

        assert_eq!(segments("abc", &[]), vec![("abc", false)]);
        assert_eq!(segments("abab", &[0..2, 2..4]), vec![("ab", true), ("ab", true)]);
    }

    #[test]
    fn test_detail_hits_by_field() {
        let detail = parse_log_detail(
            "[TCP] 10.0.0.2:5000(curl) --> www.google.com:443 match DOMAIN-SUFFIX(google.com) using Proxy",
        )
        .unwrap();
        let hit = |query: &str| detail_has_hit(&detail, &LogFilter::new(query).compile().unwrap());

        assert!(hit("curl"));
        assert!(hit("google"));
        assert!(hit("proxy"));
        // Spans two fields of the row
        assert!(!hit("match DOMAIN"));
        // Source is only shown on hover
        assert!(!hit("10.0.0.2"));
    }
}
