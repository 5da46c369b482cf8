// [libs/domain/detection/src/vendor.rs]
/// Extracts a display-time "vendor" label from an automation's name or
/// description via pattern matching. Computed at query time only; the
/// per-automation audit record always remains one row per external app,
/// this is purely a grouping convenience for the UI.
const VENDOR_MARKERS: &[(&str, &str)] = &[
    ("zapier", "Zapier"),
    ("otter.ai", "Otter.ai"),
    ("otter", "Otter.ai"),
    ("drift", "Drift"),
    ("grammarly", "Grammarly"),
    ("notion ai", "Notion AI"),
    ("salesforce einstein", "Salesforce Einstein"),
    ("hubspot", "HubSpot"),
    ("intercom", "Intercom"),
];

pub fn infer_vendor(name: &str, description: Option<&str>) -> Option<&'static str> {
    let haystack = format!("{} {}", name, description.unwrap_or_default()).to_lowercase();
    VENDOR_MARKERS.iter().find(|(marker, _)| haystack.contains(marker)).map(|(_, vendor)| *vendor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_vendor_from_name() {
        assert_eq!(infer_vendor("Zapier Connector", None), Some("Zapier"));
    }

    #[test]
    fn recognizes_vendor_from_description() {
        assert_eq!(infer_vendor("Notetaker Bot", Some("Powered by Otter.ai")), Some("Otter.ai"));
    }

    #[test]
    fn unknown_vendor_returns_none() {
        assert_eq!(infer_vendor("Internal Tool", None), None);
    }
}
