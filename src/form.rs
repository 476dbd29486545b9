//! Form encoding for POST bodies
//!
//! `application/x-www-form-urlencoded` with UTF-8 percent-encoding. Spaces
//! become `+` and entries keep the order in which they are given.

use std::fmt;
use url::form_urlencoded;

/// Encode key/value pairs as `k1=v1&k2=v2`
pub fn encode_form<I, K, V>(pairs: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

/// Stream the encoded form into `writer`
pub fn write_form<W, I, K, V>(writer: &mut W, pairs: I) -> fmt::Result
where
    W: fmt::Write,
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    for (i, (key, value)) in pairs.into_iter().enumerate() {
        if i > 0 {
            writer.write_char('&')?;
        }
        for chunk in form_urlencoded::byte_serialize(key.as_ref().as_bytes()) {
            writer.write_str(chunk)?;
        }
        writer.write_char('=')?;
        for chunk in form_urlencoded::byte_serialize(value.as_ref().as_bytes()) {
            writer.write_str(chunk)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_encodes_in_input_order() {
        assert_eq!(encode_form([("a", "1"), ("b", "x y")]), "a=1&b=x+y");
        assert_eq!(encode_form([("b", "x y"), ("a", "1")]), "b=x+y&a=1");
    }

    #[test]
    fn test_empty_mapping() {
        assert_eq!(encode_form(Vec::<(String, String)>::new()), "");
        let mut out = String::new();
        write_form(&mut out, BTreeMap::<String, String>::new()).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_percent_encodes_keys_and_values() {
        assert_eq!(
            encode_form([("room id", "1434"), ("msg", "Dryer #2 & washer=done"), ("é", "ü")]),
            "room+id=1434&msg=Dryer+%232+%26+washer%3Ddone&%C3%A9=%C3%BC"
        );
    }

    #[test]
    fn test_write_form_matches_encode_form() {
        let pairs: BTreeMap<&str, &str> = [("title", "2 machines ready"), ("count", "2")].into_iter().collect();
        let mut out = String::new();
        write_form(&mut out, pairs.iter().map(|(k, v)| (*k, *v))).unwrap();
        assert_eq!(out, encode_form(pairs.iter().map(|(k, v)| (*k, *v))));
        assert_eq!(out, "count=2&title=2+machines+ready");
    }
}
