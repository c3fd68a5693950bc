//! Structured fact extraction over a parsed report tree.
//!
//! Two passes: a generic flattening of leaf-property elements into
//! `PropertyRecord`s, then (only when the root carries the recognized vendor
//! signature) a fixed table of targeted lookups producing the curated
//! friendly summary. Extraction never fails: a missing section just leaves
//! its summary field empty.

use crate::report::markup::Element;
use serde::Serialize;

/// Root tag emitted by the supported vendor's scan tool.
pub const VENDOR_ROOT: &str = "HWSCAN";

/// Child tag names recognized as the key half of a property element.
const KEY_TAGS: &[&str] = &["key", "name", "label", "id"];

/// Child tag names recognized as the value half of a property element.
const VALUE_TAGS: &[&str] = &["value", "val", "description", "setting"];

/// Keys longer than this are treated as prose, not property keys.
const KEY_MAX_LEN: usize = 64;

/// One flattened hardware fact. `path` is the ancestor chain from the
/// document root down to the property element's parent, joined with `/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyRecord {
    pub path: String,
    pub key: String,
    pub value: String,
}

/// Flatten every qualifying leaf-property element, in document order.
///
/// An element qualifies when it has exactly two element children, both
/// leaves, whose tag names form a recognized key/value pair. Records where
/// both halves are empty are dropped.
pub fn flatten_properties(root: &Element) -> Vec<PropertyRecord> {
    let mut records = Vec::new();
    let mut trail: Vec<&str> = Vec::new();
    walk(root, &mut trail, &mut records);
    records
}

fn walk<'a>(element: &'a Element, trail: &mut Vec<&'a str>, out: &mut Vec<PropertyRecord>) {
    if let Some((key, value)) = property_parts(element) {
        if !(key.is_empty() && value.is_empty()) {
            out.push(PropertyRecord {
                path: trail.join("/"),
                key,
                value,
            });
        }
        return;
    }
    trail.push(&element.name);
    for child in element.child_elements() {
        walk(child, trail, out);
    }
    trail.pop();
}

fn property_parts(element: &Element) -> Option<(String, String)> {
    let children: Vec<&Element> = element.child_elements().collect();
    if children.len() != 2 {
        return None;
    }
    if children.iter().any(|child| child.child_elements().count() > 0) {
        return None;
    }
    let (key_el, value_el) = match (tag_role(children[0]), tag_role(children[1])) {
        (TagRole::Key, TagRole::Value) => (children[0], children[1]),
        (TagRole::Value, TagRole::Key) => (children[1], children[0]),
        _ => return None,
    };
    let key = key_el.text();
    if key.len() > KEY_MAX_LEN {
        return None;
    }
    Some((key, value_el.text()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagRole {
    Key,
    Value,
    Other,
}

fn tag_role(element: &Element) -> TagRole {
    let name = element.name.to_ascii_lowercase();
    if KEY_TAGS.contains(&name.as_str()) {
        TagRole::Key
    } else if VALUE_TAGS.contains(&name.as_str()) {
        TagRole::Value
    } else {
        TagRole::Other
    }
}

/// One way of finding a summary field.
enum Lookup {
    /// Direct tag path below the root element.
    Path(&'static [&'static str]),
    /// First flattened record with this key, optionally scoped to records
    /// whose path passes through the named ancestor section.
    Key {
        key: &'static str,
        section: Option<&'static str>,
    },
}

/// Curated fields in display order; lookups per field are tried in order and
/// the first hit wins.
const SUMMARY_FIELDS: &[(&str, &[Lookup])] = &[
    (
        "Model",
        &[
            Lookup::Path(&["SYSTEM", "MODEL"]),
            Lookup::Key {
                key: "Model",
                section: Some("SYSTEM"),
            },
        ],
    ),
    (
        "Serial number",
        &[
            Lookup::Path(&["SYSTEM", "SERIAL"]),
            Lookup::Key {
                key: "SerialNumber",
                section: None,
            },
        ],
    ),
    (
        "BIOS version",
        &[
            Lookup::Key {
                key: "BIOSVersion",
                section: Some("FIRMWARE"),
            },
            Lookup::Key {
                key: "BIOS",
                section: None,
            },
        ],
    ),
    (
        "Processor",
        &[
            Lookup::Path(&["CPU", "NAME"]),
            Lookup::Key {
                key: "Processor",
                section: None,
            },
        ],
    ),
    (
        "Installed memory",
        &[Lookup::Key {
            key: "TotalPhysical",
            section: Some("MEMORY"),
        }],
    ),
    (
        "Primary storage",
        &[Lookup::Key {
            key: "Model",
            section: Some("STORAGE"),
        }],
    ),
    (
        "Battery health",
        &[Lookup::Key {
            key: "FullChargeCapacity",
            section: Some("BATTERY"),
        }],
    ),
];

/// True when the parsed root carries the recognized vendor signature.
pub fn is_vendor_report(root: &Element) -> bool {
    root.name.eq_ignore_ascii_case(VENDOR_ROOT)
}

/// Build the curated label -> value summary. Every configured label is
/// present; a lookup that finds nothing yields an empty string.
pub fn friendly_summary(root: &Element, records: &[PropertyRecord]) -> Vec<(String, String)> {
    SUMMARY_FIELDS
        .iter()
        .map(|(label, lookups)| {
            let value = lookups
                .iter()
                .find_map(|lookup| resolve(lookup, root, records))
                .unwrap_or_default();
            ((*label).to_string(), value)
        })
        .collect()
}

fn resolve(lookup: &Lookup, root: &Element, records: &[PropertyRecord]) -> Option<String> {
    match lookup {
        Lookup::Path(path) => text_at_path(root, path),
        Lookup::Key { key, section } => first_value_by_key(records, key, *section),
    }
}

/// Follow a tag path below the root, returning the trimmed text of the
/// element it lands on.
fn text_at_path(root: &Element, path: &[&str]) -> Option<String> {
    let mut current = root;
    for segment in path {
        current = current.child(segment)?;
    }
    let text = current.text();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// First record matching the key, optionally restricted to records whose
/// path contains the named section segment. Keys compare case-insensitively.
fn first_value_by_key(
    records: &[PropertyRecord],
    key: &str,
    section: Option<&str>,
) -> Option<String> {
    records
        .iter()
        .filter(|record| match section {
            Some(section) => record
                .path
                .split('/')
                .any(|segment| segment.eq_ignore_ascii_case(section)),
            None => true,
        })
        .find(|record| record.key.eq_ignore_ascii_case(key))
        .map(|record| record.value.clone())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::markup::parse_document;

    fn parse(doc: &str) -> Element {
        parse_document(doc).expect("well-formed fixture")
    }

    #[test]
    fn flattening_yields_exactly_the_qualifying_leaves() {
        let root = parse(
            "<HWSCAN>\
               <MEMORY>\
                 <ENTRY><KEY>TotalPhysical</KEY><VALUE>16 GB</VALUE></ENTRY>\
                 <ENTRY><KEY>Channels</KEY><VALUE>2</VALUE></ENTRY>\
               </MEMORY>\
               <NOTES>free text only</NOTES>\
             </HWSCAN>",
        );
        let records = flatten_properties(&root);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].path, "HWSCAN/MEMORY");
        assert_eq!(records[0].key, "TotalPhysical");
        assert_eq!(records[0].value, "16 GB");
        assert_eq!(records[1].key, "Channels");
    }

    #[test]
    fn document_order_is_preserved_across_sections() {
        let root = parse(
            "<HWSCAN>\
               <B><ENTRY><KEY>second</KEY><VALUE>2</VALUE></ENTRY></B>\
               <A><ENTRY><KEY>third</KEY><VALUE>3</VALUE></ENTRY></A>\
             </HWSCAN>",
        );
        let records = flatten_properties(&root);
        let keys: Vec<&str> = records.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["second", "third"]);
    }

    #[test]
    fn records_with_both_halves_empty_are_dropped() {
        let root = parse(
            "<HWSCAN><S>\
               <ENTRY><KEY></KEY><VALUE></VALUE></ENTRY>\
               <ENTRY><KEY>only-key</KEY><VALUE></VALUE></ENTRY>\
             </S></HWSCAN>",
        );
        let records = flatten_properties(&root);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key, "only-key");
    }

    #[test]
    fn non_qualifying_shapes_yield_no_records() {
        // Three children, nested children, and unrecognized tag pairs.
        let root = parse(
            "<HWSCAN>\
               <X><KEY>a</KEY><VALUE>b</VALUE><EXTRA>c</EXTRA></X>\
               <Y><KEY>a</KEY><VALUE><DEEP>b</DEEP></VALUE></Y>\
               <Z><FOO>a</FOO><BAR>b</BAR></Z>\
             </HWSCAN>",
        );
        assert!(flatten_properties(&root).is_empty());
    }

    #[test]
    fn reversed_key_value_order_still_qualifies() {
        let root = parse("<HWSCAN><S><VALUE>v</VALUE><KEY>k</KEY></S></HWSCAN>");
        let records = flatten_properties(&root);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key, "k");
        assert_eq!(records[0].value, "v");
    }

    #[test]
    fn summary_prefers_the_direct_path_over_the_key_lookup() {
        let root = parse(
            "<HWSCAN>\
               <SYSTEM>\
                 <MODEL>ThinkPad T14</MODEL>\
                 <ENTRY><KEY>Model</KEY><VALUE>from-key-lookup</VALUE></ENTRY>\
               </SYSTEM>\
             </HWSCAN>",
        );
        let records = flatten_properties(&root);
        let summary = friendly_summary(&root, &records);
        let model = summary.iter().find(|(label, _)| label == "Model");
        assert_eq!(model.map(|(_, v)| v.as_str()), Some("ThinkPad T14"));
    }

    #[test]
    fn summary_falls_back_to_the_key_lookup() {
        let root = parse(
            "<HWSCAN><SYSTEM>\
               <ENTRY><KEY>SerialNumber</KEY><VALUE>PF-3XKQ1</VALUE></ENTRY>\
             </SYSTEM></HWSCAN>",
        );
        let records = flatten_properties(&root);
        let summary = friendly_summary(&root, &records);
        let serial = summary.iter().find(|(label, _)| label == "Serial number");
        assert_eq!(serial.map(|(_, v)| v.as_str()), Some("PF-3XKQ1"));
    }

    #[test]
    fn scoped_key_lookup_ignores_other_sections() {
        let root = parse(
            "<HWSCAN>\
               <SYSTEM><ENTRY><KEY>Model</KEY><VALUE>laptop</VALUE></ENTRY></SYSTEM>\
               <STORAGE><ENTRY><KEY>Model</KEY><VALUE>WDC SN570</VALUE></ENTRY></STORAGE>\
             </HWSCAN>",
        );
        let records = flatten_properties(&root);
        let summary = friendly_summary(&root, &records);
        let storage = summary.iter().find(|(label, _)| label == "Primary storage");
        assert_eq!(storage.map(|(_, v)| v.as_str()), Some("WDC SN570"));
    }

    #[test]
    fn missing_sections_yield_empty_fields_never_errors() {
        let root = parse("<HWSCAN><SYSTEM><MODEL>T14</MODEL></SYSTEM></HWSCAN>");
        let records = flatten_properties(&root);
        let summary = friendly_summary(&root, &records);
        assert_eq!(summary.len(), SUMMARY_FIELDS.len());
        let battery = summary.iter().find(|(label, _)| label == "Battery health");
        assert_eq!(battery.map(|(_, v)| v.as_str()), Some(""));
    }

    #[test]
    fn vendor_signature_is_case_insensitive() {
        assert!(is_vendor_report(&parse("<hwscan/>")));
        assert!(!is_vendor_report(&parse("<OTHER/>")));
    }
}
