//! Derived catalog members for das2 stream sources and collections.
//!
//! Everything here folds DSDF properties into a document map: contacts,
//! coordinate and data variable summaries, the stream format, reader
//! parameters, query examples and EPN obscore metadata. Each function only
//! touches the members it owns so hand-authored fields elsewhere in the
//! document survive.

use super::merge::{ensure_array, ensure_object, push_unique};
use crate::import::dsdf::{first_value, PropMap};
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{json, Map, Value};

/// Obscore field names copied into a collection's `EPNcore` member as-is.
const OBSCORE_FIELDS: &[&str] = &[
    "dataproduct_type",
    "measurement_type",
    "processing_level",
    "target_name",
    "target_class",
    "target_region",
    "feature_name",
];

/// Legacy camel-case spellings mapped to the official obscore names.
const OBSCORE_TRANSLATIONS: &[(&str, &str)] = &[
    ("dataproductType", "dataproduct_type"),
    ("measurementType", "measurement_type"),
    ("targetClass", "target_class"),
    ("targetName", "target_name"),
    ("targetRegion", "target_region"),
    ("featureName", "feature_name"),
];

/// Query URL for streaming one dataset off a das2 server.
pub fn dataset_base_url(server: &str, dataset: &str) -> String {
    format!("{}?server=dataset&dataset={}", server, dataset)
}

/// Fold obscore properties into the collection's `EPNcore` member.
pub fn merge_epncore(doc: &mut Map<String, Value>, props: &PropMap) {
    for key in props.keys() {
        let official = if OBSCORE_FIELDS.contains(&key.as_str()) {
            Some(key.as_str())
        } else {
            OBSCORE_TRANSLATIONS
                .iter()
                .find(|(legacy, _)| legacy == key)
                .map(|(_, official)| *official)
        };
        if let (Some(official), Some(value)) = (official, first_value(props, key)) {
            let value = value.to_string();
            ensure_object(doc, "EPNcore").insert(official.to_string(), Value::String(value));
        }
    }
}

pub fn merge_sci_contacts(doc: &mut Map<String, Value>, props: &PropMap) {
    merge_contacts(doc, props, "sciContact", "sci_contacts");
}

pub fn merge_tech_contacts(doc: &mut Map<String, Value>, props: &PropMap) {
    merge_contacts(doc, props, "techContact", "tech_contacts");
}

/// Contacts come as `Name <email>, Next Name <next-email>, ...`.
fn merge_contacts(doc: &mut Map<String, Value>, props: &PropMap, prop: &str, member: &str) {
    let raw = match first_value(props, prop) {
        Some(v) => v,
        None => {
            ensure_array(doc, member);
            return;
        }
    };
    let mut contacts = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        let contact = match part.find('<') {
            Some(pos) => {
                let who = part[..pos].trim();
                let email = part[pos + 1..].trim_end_matches('>').trim();
                if email.is_empty() {
                    json!({"name": who, "email": null})
                } else {
                    json!({"name": who, "email": email})
                }
            }
            None if !part.is_empty() => json!({"name": part}),
            None => continue,
        };
        contacts.push(contact);
    }
    let list = ensure_array(doc, member);
    for contact in contacts {
        push_unique(list, contact);
    }
}

/// Overview-style coordinate info for a collection document.
pub fn merge_collection_coords(doc: &mut Map<String, Value>, props: &PropMap) {
    let valid_range = first_value(props, "validRange").map(split_range);
    let coords = ensure_object(doc, "coordinates");
    {
        let time = ensure_object(coords, "time");
        if !time.contains_key("name") {
            time.insert("name".to_string(), json!("Time"));
        }
        if let Some((min, Some(max))) = valid_range.clone() {
            time.insert("valid_min".to_string(), Value::String(min));
            time.insert("valid_max".to_string(), Value::String(max));
        }
    }

    if let Some(family) = props.get("coord") {
        for raw in family.values() {
            let parts = split_parts(raw);
            if parts[0].eq_ignore_ascii_case("time") {
                if parts.len() > 1 {
                    ensure_object(coords, "time")
                        .insert("title".to_string(), Value::String(parts[1].clone()));
                }
            } else {
                let var = ensure_object(coords, &parts[0]);
                var.insert("name".to_string(), Value::String(cap_first(&parts[0])));
                if parts.len() > 1 {
                    var.insert("title".to_string(), Value::String(parts[1].clone()));
                }
                if parts.len() > 2 {
                    var.insert("units".to_string(), Value::String(parts[2].clone()));
                }
            }
        }
    }
}

/// Full coordinate interface for a stream source, including the query
/// alteration rules for the time axis.
pub fn merge_source_coords(doc: &mut Map<String, Value>, props: &PropMap) {
    let valid_range = first_value(props, "validRange").map(split_range);
    let wants_interval = props.contains_key("requiresInterval");
    let example = first_example_range(props);
    let interval_value = props.get("exampleInterval").and_then(|family| {
        example
            .as_ref()
            .and_then(|(num, _, _)| family.get(num))
            .or_else(|| family.values().next())
            .cloned()
    });

    let iface = ensure_object(doc, "interface");
    let coords = ensure_object(iface, "coordinates");
    let time = ensure_object(coords, "time");
    if !time.contains_key("name") {
        time.insert("name".to_string(), json!("Time"));
    }

    let (example_min, example_max) = match &example {
        Some((_, min, max)) => (Some(min.clone()), max.clone()),
        None => (None, None),
    };
    time.insert("minimum".to_string(), json!({ "value": example_min }));
    time.insert("maximum".to_string(), json!({ "value": example_max }));
    time.insert("units".to_string(), json!({"value": "UTC"}));

    if wants_interval {
        time.insert("interval".to_string(), json!({ "value": interval_value }));
    } else {
        let resolution = match (&example_min, &example_max) {
            (Some(min), Some(max)) => default_resolution(min, max),
            _ => None,
        };
        time.insert(
            "resolution".to_string(),
            json!({"value": resolution, "units": "s"}),
        );
    }

    let mut min_set = json!({"param": "start_time", "required": true});
    let mut max_set = json!({"param": "end_time", "required": true});
    if let Some((lo, Some(hi))) = valid_range {
        let range = json!([lo, hi]);
        min_set["range"] = range.clone();
        max_set["range"] = range;
    }
    ensure_object(time, "minimum").insert("set".to_string(), min_set);
    ensure_object(time, "maximum").insert("set".to_string(), max_set);
    if wants_interval {
        ensure_object(time, "interval")
            .insert("set".to_string(), json!({"param": "interval", "required": true}));
    } else {
        ensure_object(time, "resolution")
            .insert("set".to_string(), json!({"param": "resolution", "required": false}));
    }

    if let Some(family) = props.get("coord") {
        for raw in family.values() {
            let parts = split_parts(raw);
            if parts[0].eq_ignore_ascii_case("time") {
                if parts.len() > 1 {
                    ensure_object(coords, "time")
                        .insert("title".to_string(), Value::String(parts[1].clone()));
                }
            } else {
                let var = ensure_object(coords, &parts[0]);
                var.insert("name".to_string(), Value::String(cap_first(&parts[0])));
                if parts.len() > 1 {
                    var.insert("title".to_string(), Value::String(parts[1].clone()));
                }
                if parts.len() > 2 {
                    var.insert("units".to_string(), json!({"value": parts[2].clone()}));
                }
            }
        }
    }
}

pub fn merge_collection_data(doc: &mut Map<String, Value>, props: &PropMap) {
    if !props.contains_key("item") && !props.contains_key("data") {
        return;
    }
    let data = ensure_object(doc, "data");
    merge_data_items(data, props, true);
}

pub fn merge_source_data(doc: &mut Map<String, Value>, props: &PropMap) {
    if !props.contains_key("item") && !props.contains_key("data") {
        return;
    }
    let iface = ensure_object(doc, "interface");
    let data = ensure_object(iface, "data");
    merge_data_items(data, props, false);
}

fn merge_data_items(data: &mut Map<String, Value>, props: &PropMap, wrap_units: bool) {
    for prop in ["item", "data"] {
        let family = match props.get(prop) {
            Some(f) => f,
            None => continue,
        };
        for raw in family.values() {
            let parts = split_parts(raw);
            let var = ensure_object(data, &parts[0]);
            var.insert("name".to_string(), Value::String(cap_first(&parts[0])));
            if parts.len() > 1 {
                var.insert("title".to_string(), Value::String(parts[1].clone()));
            }
            if parts.len() > 2 {
                let units = if wrap_units {
                    json!({"value": parts[2].clone()})
                } else {
                    Value::String(parts[2].clone())
                };
                var.insert("units".to_string(), units);
            }
        }
    }
}

/// Default stream format from the DSDF, plus a text-conversion option for
/// das2 streams.
pub fn merge_format(doc: &mut Map<String, Value>, props: &PropMap) {
    let default = if props.contains_key("das2Stream") {
        json!({"name": "Das2 Stream", "mime": "application/vnd.das2.das2stream"})
    } else if props.contains_key("qstream") {
        json!({"name": "QStream", "mime": "application/vnd.das2.qstream"})
    } else {
        json!({"name": "Das1 Stream", "mime": "application/binary"})
    };
    let is_das2 = default["name"] == "Das2 Stream";
    ensure_object(doc, "format").insert("default".to_string(), default);

    if is_das2 {
        let iface = ensure_object(doc, "interface");
        let opts = ensure_object(iface, "options");
        let text = ensure_object(opts, "text");
        text.insert(
            "title".to_string(),
            json!("Convert output to text (utf-8) format"),
        );
        text.insert("value".to_string(), json!(false));
        text.insert(
            "set".to_string(),
            json!({"value": true, "param": "ascii", "pval": "true"}),
        );
    }
}

/// Reader arguments. A `param` family whose every value is `flag | title`
/// becomes a flag set; anything else collapses to one free-form string
/// parameter.
pub fn merge_das2_params(doc: &mut Map<String, Value>, props: &PropMap) {
    let family = match props.get("param") {
        Some(f) => f,
        None => return,
    };

    let split: Vec<(String, Vec<String>)> = family
        .iter()
        .map(|(num, raw)| (num.clone(), split_parts(raw)))
        .collect();
    let flag_set = split.iter().all(|(_, parts)| parts.len() == 2);

    let params = if flag_set {
        let mut flags = Map::new();
        for (num, parts) in &split {
            let flag = match parts[0].to_ascii_lowercase().as_str() {
                "integer" => json!({"type": "integer", "name": parts[0], "title": parts[1]}),
                "real" => json!({"type": "real", "name": parts[0], "title": parts[1]}),
                _ => json!({"value": parts[0], "name": parts[0], "title": parts[1]}),
            };
            flags.insert(num.clone(), flag);
        }
        json!({
            "type": "flag_set",
            "required": false,
            "title": "Optional reader arguments",
            "flag_sep": " ",
            "flags": flags
        })
    } else {
        let description = family.values().cloned().collect::<Vec<_>>().join("\n");
        json!({
            "type": "string",
            "required": false,
            "title": "Optional reader arguments",
            "description": description,
            "name": "Reader Parameters"
        })
    };

    let example_value = family
        .keys()
        .next()
        .and_then(|num| props.get("exampleParams").and_then(|f| f.get(num)))
        .cloned()
        .unwrap_or_default();

    {
        let proto = ensure_object(doc, "protocol");
        let http = ensure_object(proto, "http_params");
        http.insert("params".to_string(), params.clone());
    }

    let iface = ensure_object(doc, "interface");
    let opts = ensure_object(iface, "options");
    if params["type"] == "string" {
        let extra = ensure_object(opts, "extra");
        extra.insert("value".to_string(), Value::String(example_value));
        extra.insert("set".to_string(), json!({"param": "params"}));
        extra.insert("name".to_string(), json!("Extra Reader Parameters"));
        if let Some(description) = params.get("description") {
            extra.insert("description".to_string(), description.clone());
        }
    } else {
        for (num, parts) in &split {
            let opt_name = parts[0].trim_matches('-').trim().to_ascii_lowercase();
            let opt = ensure_object(opts, &opt_name);
            opt.insert("title".to_string(), Value::String(parts[1].clone()));
            if matches!(parts[0].to_ascii_lowercase().as_str(), "integer" | "real") {
                opt.insert("value".to_string(), Value::Null);
                opt.insert("set".to_string(), json!({"param": "params", "flag": num}));
            } else {
                opt.insert("type".to_string(), json!("boolean"));
                opt.insert("value".to_string(), json!(false));
                opt.insert(
                    "set".to_string(),
                    json!({"value": true, "param": "params", "flag": num}),
                );
            }
        }
    }
}

/// Build `protocol.examples` from the example families, one entry per
/// `exampleRange`, matched to intervals and parameters by subkey.
pub fn merge_examples(doc: &mut Map<String, Value>, props: &PropMap, base_url: &str) {
    let ranges = match props.get("exampleRange") {
        Some(f) => f,
        None => return,
    };

    let mut examples = Map::new();
    for (num, raw) in ranges {
        let parts = split_parts(raw);
        let range: Vec<&str> = parts[0].split("to").map(str::trim).collect();
        if range.len() < 2 {
            continue;
        }
        let begin = range[0].to_string();
        let end = range[1].replace("UTC", "").trim().to_string();

        // Logical query order, also used for the URL.
        let mut query: Vec<(String, String)> = vec![
            ("start_time".to_string(), begin.clone()),
            ("end_time".to_string(), end.clone()),
        ];
        match props.get("exampleInterval").and_then(|f| f.get(num)) {
            Some(interval) => query.push(("interval".to_string(), interval.clone())),
            None => {
                if let Some(resolution) = default_resolution(&begin, &end) {
                    query.push(("resolution".to_string(), format!("{}", resolution)));
                }
            }
        }
        if let Some(params) = props.get("exampleParams").and_then(|f| f.get(num)) {
            query.push(("params".to_string(), params.clone()));
        }

        let mut http_params = Map::new();
        for (key, value) in &query {
            http_params.insert(key.clone(), Value::String(value.clone()));
        }

        let mut example = Map::new();
        example.insert("name".to_string(), Value::String(format!("Example {}", num)));
        if parts.len() > 1 {
            example.insert("title".to_string(), Value::String(parts[1].clone()));
        }
        example.insert("http_params".to_string(), Value::Object(http_params));
        example.insert(
            "url".to_string(),
            Value::String(query_url(base_url, &query)),
        );
        examples.insert(format!("example_{}", num), Value::Object(example));
    }

    if !examples.is_empty() {
        ensure_object(doc, "protocol").insert("examples".to_string(), Value::Object(examples));
    }
}

fn query_url(base_url: &str, query: &[(String, String)]) -> String {
    match reqwest::Url::parse(base_url) {
        Ok(mut url) => {
            {
                let mut pairs = url.query_pairs_mut();
                for (key, value) in query {
                    pairs.append_pair(key, value);
                }
            }
            url.to_string()
        }
        Err(_) => {
            let tail: Vec<String> = query
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            format!("{}&{}", base_url, tail.join("&"))
        }
    }
}

/// First `exampleRange` by subkey, split into (subkey, begin, end).
fn first_example_range(props: &PropMap) -> Option<(String, String, Option<String>)> {
    let (num, raw) = props.get("exampleRange")?.iter().next()?;
    let parts = split_parts(raw);
    let range: Vec<&str> = parts[0].split("to").map(str::trim).collect();
    let begin = range[0].to_string();
    let end = range
        .get(1)
        .map(|s| s.replace("UTC", "").trim().to_string());
    Some((num.clone(), begin, end))
}

/// Fallback query resolution: 1/2000th of the example range, in seconds.
fn default_resolution(begin: &str, end: &str) -> Option<f64> {
    let begin = parse_time(begin)?;
    let end = parse_time(end)?;
    Some((end - begin).num_milliseconds() as f64 / 1000.0 / 2000.0)
}

/// Lenient timestamp parsing for the handful of forms DSDFs use, including
/// day-of-year dates.
fn parse_time(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    const WITH_TIME: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
        "%Y-%jT%H:%M:%S%.f",
        "%Y-%jT%H:%M",
    ];
    for fmt in WITH_TIME {
        if let Ok(t) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(t);
        }
    }
    const DATE_ONLY: &[&str] = &["%Y-%m-%d", "%Y-%j"];
    for fmt in DATE_ONLY {
        if let Ok(d) = NaiveDate::parse_from_str(text, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

fn split_parts(raw: &str) -> Vec<String> {
    raw.split('|').map(|s| s.trim().to_string()).collect()
}

fn split_range(raw: &str) -> (String, Option<String>) {
    let parts: Vec<&str> = raw.split("to").map(str::trim).collect();
    (parts[0].to_string(), parts.get(1).map(|s| s.to_string()))
}

fn cap_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::dsdf::parse_props;

    fn props_from(attrs: &str) -> PropMap {
        parse_props("u", &format!("<properties {} />", attrs)).unwrap()
    }

    fn empty_doc() -> Map<String, Value> {
        Map::new()
    }

    #[test]
    fn test_contacts_split_and_dedup() {
        let props = props_from(
            r#"sciContact="L. Granroth &lt;larry@uiowa.edu&gt;, C. Piker""#,
        );
        let mut doc = empty_doc();
        merge_sci_contacts(&mut doc, &props);
        merge_sci_contacts(&mut doc, &props);
        let contacts = doc["sci_contacts"].as_array().unwrap();
        assert_eq!(contacts.len(), 2);
        assert_eq!(contacts[0]["name"], "L. Granroth");
        assert_eq!(contacts[0]["email"], "larry@uiowa.edu");
        assert_eq!(contacts[1], json!({"name": "C. Piker"}));
    }

    #[test]
    fn test_source_coords_resolution_default() {
        let props = props_from(r#"exampleRange_01="2017-02-01 to 2017-02-02""#);
        let mut doc = empty_doc();
        merge_source_coords(&mut doc, &props);
        let time = &doc["interface"]["coordinates"]["time"];
        assert_eq!(time["minimum"]["value"], "2017-02-01");
        assert_eq!(time["maximum"]["value"], "2017-02-02");
        // One day over 2000 points.
        assert_eq!(time["resolution"]["value"], json!(43.2));
        assert_eq!(time["resolution"]["set"]["param"], "resolution");
        assert_eq!(time["minimum"]["set"]["param"], "start_time");
    }

    #[test]
    fn test_source_coords_interval_mode() {
        let props = props_from(
            r#"requiresInterval="true" exampleRange_00="2013-061 to 2013-062" exampleInterval_00="60""#,
        );
        let mut doc = empty_doc();
        merge_source_coords(&mut doc, &props);
        let time = &doc["interface"]["coordinates"]["time"];
        assert_eq!(time["interval"]["value"], "60");
        assert_eq!(time["interval"]["set"]["param"], "interval");
        assert!(time.get("resolution").is_none());
    }

    #[test]
    fn test_extra_coords_and_valid_range() {
        let props = props_from(
            r#"coord00="time | Spacecraft Event Time" coord01="frequency | Channel center | Hz" validRange="1977-01-01 to 2020-01-01""#,
        );
        let mut doc = empty_doc();
        merge_collection_coords(&mut doc, &props);
        let coords = &doc["coordinates"];
        assert_eq!(coords["time"]["title"], "Spacecraft Event Time");
        assert_eq!(coords["time"]["valid_min"], "1977-01-01");
        assert_eq!(coords["frequency"]["name"], "Frequency");
        assert_eq!(coords["frequency"]["units"], "Hz");
    }

    #[test]
    fn test_format_text_option_only_for_das2() {
        let props = props_from(r#"das2Stream="1""#);
        let mut doc = empty_doc();
        merge_format(&mut doc, &props);
        assert_eq!(doc["format"]["default"]["name"], "Das2 Stream");
        assert_eq!(doc["interface"]["options"]["text"]["set"]["param"], "ascii");

        let mut plain = empty_doc();
        merge_format(&mut plain, &props_from(r#"qstream="1""#));
        assert_eq!(plain["format"]["default"]["name"], "QStream");
        assert!(plain.get("interface").is_none());
    }

    #[test]
    fn test_params_flag_set() {
        let props = props_from(
            r#"param_00="--lfr | low frequency receiver only" param_01="--hfr | high frequency receiver only""#,
        );
        let mut doc = empty_doc();
        merge_das2_params(&mut doc, &props);
        let params = &doc["protocol"]["http_params"]["params"];
        assert_eq!(params["type"], "flag_set");
        assert_eq!(params["flags"]["00"]["value"], "--lfr");
        let opt = &doc["interface"]["options"]["lfr"];
        assert_eq!(opt["type"], "boolean");
        assert_eq!(opt["set"]["flag"], "00");
    }

    #[test]
    fn test_params_fall_back_to_string() {
        let props = props_from(
            r#"param_00="anything goes here" exampleParams_00="--units=V/m""#,
        );
        let mut doc = empty_doc();
        merge_das2_params(&mut doc, &props);
        let params = &doc["protocol"]["http_params"]["params"];
        assert_eq!(params["type"], "string");
        assert_eq!(params["description"], "anything goes here");
        assert_eq!(doc["interface"]["options"]["extra"]["value"], "--units=V/m");
    }

    #[test]
    fn test_examples_built_from_families() {
        let props = props_from(
            r#"exampleRange_01="2017-02-01 to 2017-02-02 UTC | Perijove 4" exampleParams_01="--lfr""#,
        );
        let mut doc = empty_doc();
        let base = "http://example.org/das2Server?server=dataset&dataset=juno/wav";
        merge_examples(&mut doc, &props, base);
        let example = &doc["protocol"]["examples"]["example_01"];
        assert_eq!(example["name"], "Example 01");
        assert_eq!(example["title"], "Perijove 4");
        assert_eq!(example["http_params"]["end_time"], "2017-02-02");
        assert_eq!(example["http_params"]["params"], "--lfr");
        let url = example["url"].as_str().unwrap();
        assert!(url.starts_with(base));
        assert!(url.contains("start_time=2017-02-01"));
        assert!(url.contains("params=--lfr"));
    }

    #[test]
    fn test_epncore_translation() {
        let props = props_from(
            r#"targetName="Jupiter" measurement_type="radio" irrelevant="x""#,
        );
        let mut doc = empty_doc();
        merge_epncore(&mut doc, &props);
        assert_eq!(
            doc["EPNcore"],
            json!({"target_name": "Jupiter", "measurement_type": "radio"})
        );
    }

    #[test]
    fn test_parse_time_forms() {
        assert!(parse_time("2017-02-01").is_some());
        assert!(parse_time("2013-061").is_some());
        assert!(parse_time("2017-02-01T12:30:00.125").is_some());
        assert!(parse_time("yesterday").is_none());
    }
}
