use anyhow::Context;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Flattened quick-xml event with owned, unescaped strings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum XmlEvent {
    Start {
        name: String,
        attrs: Vec<(String, String)>,
    },
    End {
        name: String,
    },
    Empty {
        name: String,
        attrs: Vec<(String, String)>,
    },
    Text {
        text: String,
    },
    Comment {
        text: String,
    },
}

/// Read a whole XML part. Declarations, processing instructions and doctypes are dropped.
pub fn parse_events(name: &str, xml_bytes: &[u8]) -> anyhow::Result<Vec<XmlEvent>> {
    let mut reader = Reader::from_reader(xml_bytes);
    reader.config_mut().trim_text(false);

    let mut events: Vec<XmlEvent> = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let ev = reader
            .read_event_into(&mut buf)
            .with_context(|| format!("read xml event in {name}"))?;
        match ev {
            Event::Eof => break,
            Event::Start(s) => events.push(XmlEvent::Start {
                name: bytes_to_string(s.name().as_ref()),
                attrs: collect_attrs(&s)?,
            }),
            Event::End(e) => events.push(XmlEvent::End {
                name: bytes_to_string(e.name().as_ref()),
            }),
            Event::Empty(s) => events.push(XmlEvent::Empty {
                name: bytes_to_string(s.name().as_ref()),
                attrs: collect_attrs(&s)?,
            }),
            Event::Text(t) => {
                let text = t
                    .unescape()
                    .with_context(|| format!("unescape text in {name}"))?
                    .into_owned();
                events.push(XmlEvent::Text { text });
            }
            Event::CData(t) => events.push(XmlEvent::Text {
                text: bytes_to_string(t.into_inner()),
            }),
            Event::Comment(t) => events.push(XmlEvent::Comment {
                text: bytes_to_string(t.into_inner()),
            }),
            Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
        }
    }
    Ok(events)
}

fn collect_attrs(s: &BytesStart<'_>) -> anyhow::Result<Vec<(String, String)>> {
    let mut attrs: Vec<(String, String)> = Vec::new();
    for a in s.attributes() {
        let a = a.context("attr")?;
        let key = bytes_to_string(a.key.as_ref());
        let val = a.unescape_value().context("attr value")?.into_owned();
        attrs.push((key, val));
    }
    Ok(attrs)
}

fn bytes_to_string(bytes: impl AsRef<[u8]>) -> String {
    String::from_utf8_lossy(bytes.as_ref()).into_owned()
}

pub fn find_attr<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_unescapes() {
        let xml = br#"<?xml version="1.0"?><a x="1 &amp; 2"><b/>t &lt; u<!--c--></a>"#;
        let events = parse_events("test.xml", xml).expect("parse");
        assert_eq!(
            events,
            vec![
                XmlEvent::Start {
                    name: "a".into(),
                    attrs: vec![("x".into(), "1 & 2".into())]
                },
                XmlEvent::Empty {
                    name: "b".into(),
                    attrs: vec![]
                },
                XmlEvent::Text {
                    text: "t < u".into()
                },
                XmlEvent::Comment { text: "c".into() },
                XmlEvent::End { name: "a".into() },
            ]
        );
        if let XmlEvent::Start { attrs, .. } = &events[0] {
            assert_eq!(find_attr(attrs, "x"), Some("1 & 2"));
        }
    }
}
