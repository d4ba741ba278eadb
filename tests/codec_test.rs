//! Integration tests for the typed XML value codec.

use proptest::prelude::*;
use simtree::xml::WireType;
use simtree::{Error, Map, OptionList, Uri, Value, XmlNode};

/// Encode `value` under `key`, push it through XML text and decode it back.
fn through_text<T: WireType>(key: &str, value: T) -> T {
    let mut map = Map::new();
    map.set_value(key, value).unwrap();
    let text = map.to_xml_string();
    Map::parse(&text).unwrap().get_value(key).unwrap()
}

fn array_through_text<T: WireType>(key: &str, values: &[T], delimiter: &str) -> Vec<T> {
    let mut map = Map::new();
    map.set_array(key, values, delimiter).unwrap();
    let text = map.to_xml_string();
    Map::parse(&text).unwrap().get_array(key).unwrap()
}

proptest! {
    #[test]
    fn prop_integer_roundtrip(v in any::<i32>()) {
        prop_assert_eq!(through_text("v", v), v);
    }

    #[test]
    fn prop_unsigned_roundtrip(v in any::<u32>()) {
        prop_assert_eq!(through_text("v", v), v);
    }

    #[test]
    fn prop_real_roundtrip(v in -1.0e300_f64..1.0e300_f64) {
        prop_assert_eq!(through_text("v", v), v);
    }

    #[test]
    fn prop_bool_roundtrip(v in any::<bool>()) {
        prop_assert_eq!(through_text("v", v), v);
    }

    #[test]
    fn prop_string_roundtrip(v in "[a-zA-Z0-9 _.,:<>&'\"-]{0,32}") {
        prop_assert_eq!(through_text("v", v.clone()), v);
    }

    #[test]
    fn prop_uri_roundtrip(segments in prop::collection::vec("[a-z][a-z0-9_]{0,7}", 1..5)) {
        let uri = Uri::from_segments(segments);
        prop_assert_eq!(through_text("v", uri.clone()), uri);
    }

    #[test]
    fn prop_integer_array_roundtrip(
        values in prop::collection::vec(any::<i32>(), 0..24),
        delimiter in prop::sample::select(vec![";", ",", " ", "|", "::"]),
    ) {
        prop_assert_eq!(array_through_text("xs", &values, delimiter), values);
    }

    #[test]
    fn prop_real_array_roundtrip(values in prop::collection::vec(-1.0e12_f64..1.0e12_f64, 0..24)) {
        prop_assert_eq!(array_through_text("xs", &values, ";"), values);
    }

    #[test]
    fn prop_string_array_roundtrip(values in prop::collection::vec("[a-z0-9 ]{1,8}", 0..12)) {
        prop_assert_eq!(array_through_text("names", &values, ";"), values);
    }

    #[test]
    fn prop_blank_strings_survive_option_listing(values in prop::collection::vec(" {1,4}", 1..4)) {
        let mut options = OptionList::new();
        options.add_array_option("sep", values.clone(), "Separators").unwrap();
        let allowed: Vec<Value> = values.iter().cloned().map(Value::String).collect();
        options.restrict_to("sep", allowed).unwrap();

        let text = options.to_map(";").unwrap().to_xml_string();
        let rebuilt = OptionList::from_map(&Map::parse(&text).unwrap()).unwrap();
        prop_assert_eq!(rebuilt.array::<String>("sep").unwrap(), values.clone());
        prop_assert_eq!(rebuilt.get("sep").unwrap().restricted_values().len(), values.len());
    }

    #[test]
    fn prop_truncated_array_is_rejected(
        values in prop::collection::vec(any::<i32>(), 2..24),
        keep in 1_usize..23,
    ) {
        let keep = keep.min(values.len() - 1);
        let mut map = Map::new();
        map.set_array("xs", &values, ";").unwrap();
        let truncated: Vec<String> = values[..keep].iter().map(ToString::to_string).collect();
        map.find_value_mut("xs").unwrap().text = truncated.join(";");

        let err = map.get_array::<i32>("xs").unwrap_err();
        prop_assert_eq!(
            err,
            Error::SizeMismatch { key: "xs".into(), expected: values.len(), found: keep }
        );
    }
}

#[test]
fn test_update_in_place_keeps_node() {
    let mut map = Map::new();
    map.set_value("cfl", 0.5_f64).unwrap().set_attr("descr", "Courant number");
    map.set_value("other", 1_i32).unwrap();
    map.set_value("cfl", 0.9_f64).unwrap();

    assert_eq!(map.keys(), vec!["cfl", "other"]);
    assert_eq!(map.descr("cfl"), Some("Courant number"));
    assert_eq!(map.get_value::<f64>("cfl").unwrap(), 0.9);
}

#[test]
fn test_type_errors() {
    let mut map = Map::new();
    map.set_value("n", 3_i32).unwrap();
    assert!(matches!(map.set_value("n", 3_u32), Err(Error::TypeConflict { .. })));
    assert!(matches!(map.set_array("n", &[1_i32], ";"), Err(Error::TypeConflict { .. })));
    assert!(matches!(map.get_value::<bool>("n"), Err(Error::TypeMismatch { .. })));
    assert!(matches!(map.get_array::<i32>("n"), Err(Error::TypeMismatch { .. })));
    assert_eq!(map.get_value::<i32>("missing").unwrap_err().kind(), simtree::ErrorKind::NotFound);
    assert_eq!(map.set_array("xs", &[1_i32], "").unwrap_err(), Error::EmptyDelimiter);
    assert_eq!(map.set_value("", 1_i32).unwrap_err(), Error::EmptyKey);
}

#[test]
fn test_missing_delimiter() {
    let text = r#"<map><array key="xs" type="integer" size="2">1;2</array></map>"#;
    let map = Map::parse(text).unwrap();
    assert_eq!(map.get_array::<i32>("xs").unwrap_err(), Error::MissingDelimiter("xs".into()));
}

#[test]
fn test_delimiter_collision_is_detected() {
    let mut map = Map::new();
    map.set_array("names", &["a;b".to_string(), "c".to_string()], ";").unwrap();
    assert!(matches!(
        map.get_array::<String>("names"),
        Err(Error::SizeMismatch { expected: 2, found: 3, .. })
    ));
}

#[test]
fn test_empty_and_single_empty_arrays_differ() {
    let mut map = Map::new();
    map.set_array::<String>("none", &[], ";").unwrap();
    map.set_array("one", &[String::new()], ";").unwrap();
    let map = Map::parse(&map.to_xml_string()).unwrap();
    assert!(map.get_array::<String>("none").unwrap().is_empty());
    assert_eq!(map.get_array::<String>("one").unwrap(), vec![String::new()]);
}

#[test]
fn test_malformed_xml() {
    for text in ["", "<map>", "<map></value>", "<a/><b/>", "text<map/>"] {
        assert!(
            matches!(XmlNode::parse(text), Err(Error::MalformedPayload(_))),
            "{text:?}"
        );
    }
}
