use crate::domain::battery::BatteryLevel;
use crate::domain::models::AdapterState;
use crate::domain::tracker::ViewSnapshot;

pub const NO_DEVICES: &str = "No connected devices";
pub const DEVICES_FOUND: &str = "Connected devices found";
pub const NO_ADAPTER: &str = "No adapter";

/// Plain text rendering of a [`ViewSnapshot`]
pub struct ConsoleView;

impl ConsoleView {
    pub fn adapter_line(adapter: Option<&AdapterState>) -> String {
        match adapter {
            Some(adapter) => format!(
                "Adapter: {} ({}){}",
                adapter.name.as_deref().unwrap_or("Local Adapter"),
                adapter.address.as_deref().unwrap_or("unknown"),
                if adapter.powered { "" } else { " [powered off]" }
            ),
            None => format!("Adapter: {}", NO_ADAPTER),
        }
    }

    pub fn placeholder(view: &ViewSnapshot) -> &'static str {
        if view.devices.is_empty() {
            NO_DEVICES
        } else {
            DEVICES_FOUND
        }
    }

    pub fn level_text(level: Option<BatteryLevel>) -> String {
        match level {
            Some(level) => level.to_string(),
            None => "-".to_string(),
        }
    }

    pub fn level_line(level: Option<BatteryLevel>) -> String {
        match level {
            Some(level) => format!("Battery: {} ({})", level, level.tier()),
            None => format!("Battery: {}", Self::level_text(None)),
        }
    }

    /// Whole screen, one entry per line. The selected device is marked `*`.
    pub fn render(view: &ViewSnapshot) -> Vec<String> {
        let mut lines = vec![Self::adapter_line(view.adapter.as_ref())];
        if !view.ready {
            lines.push("Enumerating devices...".to_string());
        }
        lines.push(Self::placeholder(view).to_string());

        for (address, name) in &view.devices {
            let marker = if view.selected.as_deref() == Some(address.as_str()) {
                '*'
            } else {
                ' '
            };
            lines.push(format!(" {} {}  [{}]", marker, name, address));
        }

        lines.push(Self::level_line(view.level));
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device_view() -> ViewSnapshot {
        ViewSnapshot {
            devices: vec![
                ("AA".to_string(), "Keyboard".to_string()),
                ("BB".to_string(), "BB".to_string()),
            ],
            selected: Some("BB".to_string()),
            level: Some(BatteryLevel::new(41)),
            adapter: Some(AdapterState {
                name: Some("hci0".to_string()),
                address: None,
                powered: true,
            }),
            ready: true,
        }
    }

    #[test]
    fn test_empty_view() {
        let lines = ConsoleView::render(&ViewSnapshot::default());
        assert_eq!(
            lines,
            vec![
                "Adapter: No adapter",
                "Enumerating devices...",
                NO_DEVICES,
                "Battery: -",
            ]
        );
    }

    #[test]
    fn test_device_list_marks_selection() {
        let lines = ConsoleView::render(&device_view());
        assert_eq!(lines[0], "Adapter: hci0 (unknown)");
        assert_eq!(lines[1], DEVICES_FOUND);
        assert_eq!(lines[2], "   Keyboard  [AA]");
        assert_eq!(lines[3], " * BB  [BB]");
        assert_eq!(lines[4], "Battery: 41% (medium)");
    }

    #[test]
    fn test_adapter_defaults() {
        let adapter = AdapterState::default();
        assert_eq!(
            ConsoleView::adapter_line(Some(&adapter)),
            "Adapter: Local Adapter (unknown) [powered off]"
        );
    }

    #[test]
    fn test_level_text() {
        assert_eq!(ConsoleView::level_text(None), "-");
        assert_eq!(ConsoleView::level_text(Some(BatteryLevel::new(100))), "100%");
        assert_eq!(
            ConsoleView::level_line(Some(BatteryLevel::new(12))),
            "Battery: 12% (low)"
        );
    }
}
