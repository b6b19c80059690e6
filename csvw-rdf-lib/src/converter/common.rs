//! JSON-LD to RDF for notes and common properties.

use oxrdf::{NamedNode, Subject, Term, Triple};
use serde_json::{Map, Value as JsonValue};

use crate::error::CsvwError;
use crate::metadata::csvw_context;
use crate::rdf::vocab::{csvw, rdf, xsd};
use crate::rdf::RdfSink;

fn expand(sink: &mut dyn RdfSink, name: &str) -> Result<NamedNode, CsvwError> {
    let iri = csvw_context().expand_term(name).ok_or_else(|| {
        CsvwError::Conversion(format!("Unable to expand '{}' to an absolute IRI", name))
    })?;
    sink.iri_node(&iri)
}

/// Emits `notes` as `csvw:note` and every common property of a group or
/// table, with `subject` as the initial subject. A note or property that
/// fails is left out and its message returned; only sink I/O errors abort.
pub(crate) fn emit_annotations(
    sink: &mut dyn RdfSink,
    subject: &Subject,
    properties: &Map<String, JsonValue>,
    notes: &[JsonValue],
) -> Result<Vec<String>, CsvwError> {
    let mut errors = Vec::new();
    if !notes.is_empty() {
        let note = sink.iri_node(csvw::NOTE)?;
        for value in notes {
            let emitted = emit_value(sink, subject, &note, value);
            keep_going(&mut errors, emitted)?;
        }
    }
    for (name, value) in properties {
        let emitted = match expand(sink, name) {
            Ok(predicate) => emit_value(sink, subject, &predicate, value),
            Err(e) => Err(e),
        };
        keep_going(&mut errors, emitted)?;
    }
    Ok(errors)
}

fn keep_going(errors: &mut Vec<String>, result: Result<(), CsvwError>) -> Result<(), CsvwError> {
    match result {
        Ok(()) => Ok(()),
        Err(CsvwError::Io(e)) => Err(e.into()),
        Err(CsvwError::Conversion(message)) => {
            errors.push(message);
            Ok(())
        }
        Err(e) => {
            errors.push(e.to_string());
            Ok(())
        }
    }
}

fn emit_value(
    sink: &mut dyn RdfSink,
    subject: &Subject,
    predicate: &NamedNode,
    value: &JsonValue,
) -> Result<(), CsvwError> {
    let object: Term = match value {
        JsonValue::Null => return Ok(()),
        JsonValue::Array(items) => {
            for item in items {
                emit_value(sink, subject, predicate, item)?;
            }
            return Ok(());
        }
        JsonValue::Object(object) if object.contains_key("@value") => {
            value_object(sink, object)?.into()
        }
        JsonValue::Object(object) => {
            let node: Subject = match object.get("@id").and_then(JsonValue::as_str) {
                Some(id) => sink.iri_node(id)?.into(),
                None => sink.blank_node().into(),
            };
            sink.handle_triple(Triple::new(subject.clone(), predicate.clone(), node.clone()))?;
            emit_node(sink, &node, object)?;
            return Ok(());
        }
        JsonValue::Bool(flag) => sink
            .typed_literal_node(if *flag { "true" } else { "false" }, xsd::BOOLEAN)?
            .into(),
        JsonValue::Number(number) if number.is_i64() || number.is_u64() => sink
            .typed_literal_node(&number.to_string(), xsd::INTEGER)?
            .into(),
        JsonValue::Number(number) => {
            let lexical = format!("{:E}", number.as_f64().unwrap_or(f64::NAN));
            sink.typed_literal_node(&lexical, xsd::DOUBLE)?.into()
        }
        JsonValue::String(text) => sink.typed_literal_node(text, xsd::STRING)?.into(),
    };
    sink.handle_triple(Triple::new(subject.clone(), predicate.clone(), object))
}

fn value_object(
    sink: &mut dyn RdfSink,
    object: &Map<String, JsonValue>,
) -> Result<oxrdf::Literal, CsvwError> {
    let lexical = match &object["@value"] {
        JsonValue::String(text) => text.clone(),
        other => other.to_string(),
    };
    if let Some(datatype) = object.get("@type").and_then(JsonValue::as_str) {
        let datatype = expand(sink, datatype)?;
        return sink.typed_literal_node(&lexical, datatype.as_str());
    }
    if let Some(language) = object.get("@language").and_then(JsonValue::as_str) {
        return sink.lang_literal_node(&lexical, language);
    }
    sink.typed_literal_node(&lexical, xsd::STRING)
}

fn emit_node(
    sink: &mut dyn RdfSink,
    node: &Subject,
    object: &Map<String, JsonValue>,
) -> Result<(), CsvwError> {
    let types = match object.get("@type") {
        Some(JsonValue::Array(types)) => types.iter().filter_map(JsonValue::as_str).collect(),
        Some(JsonValue::String(single)) => vec![single.as_str()],
        _ => Vec::new(),
    };
    if !types.is_empty() {
        let rdf_type = sink.iri_node(rdf::TYPE)?;
        for name in types {
            let class = expand(sink, name)?;
            sink.handle_triple(Triple::new(node.clone(), rdf_type.clone(), class))?;
        }
    }
    for (name, value) in object.iter().filter(|(name, _)| !name.starts_with('@')) {
        let predicate = expand(sink, name)?;
        emit_value(sink, node, &predicate, value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::GraphSink;
    use oxrdf::{Literal, NamedNodeRef, TermRef};
    use serde_json::json;

    #[test]
    fn test_common_properties() {
        let mut sink = GraphSink::new();
        let subject: Subject = NamedNode::new_unchecked("http://example.org/table").into();
        let properties = json!({
            "dc:title": {"@value": "Countries", "@language": "en"},
            "dcat:keyword": [{"@value": "geo"}, {"@value": "country"}],
            "dc:publisher": {
                "@id": "http://example.org/org",
                "@type": "schema:Organization",
                "schema:name": {"@value": "Example"},
                "schema:employees": 12
            }
        });
        let notes = vec![json!({"rdfs:comment": {"@value": "checked"}})];

        let errors =
            emit_annotations(&mut sink, &subject, properties.as_object().unwrap(), &notes).unwrap();
        assert!(errors.is_empty(), "{:?}", errors);
        let graph = sink.graph();
        assert_eq!(graph.len(), 9);

        let title = NamedNodeRef::new_unchecked("http://purl.org/dc/terms/title");
        let object = graph
            .object_for_subject_predicate(&subject, title)
            .map(TermRef::into_owned);
        assert_eq!(
            object,
            Some(Term::from(Literal::new_language_tagged_literal_unchecked("Countries", "en")))
        );

        let publisher = NamedNodeRef::new_unchecked("http://example.org/org");
        let employees = NamedNodeRef::new_unchecked("http://schema.org/employees");
        let object = graph
            .object_for_subject_predicate(publisher, employees)
            .map(TermRef::into_owned);
        assert_eq!(
            object,
            Some(Term::from(Literal::new_typed_literal(
                "12",
                NamedNode::new_unchecked(xsd::INTEGER)
            )))
        );

        let note = NamedNodeRef::new_unchecked(csvw::NOTE);
        assert!(matches!(
            graph.object_for_subject_predicate(&subject, note),
            Some(TermRef::BlankNode(_))
        ));
    }

    #[test]
    fn test_unexpandable_name_is_left_out() {
        let mut sink = GraphSink::new();
        let subject: Subject = sink.blank_node().into();
        let properties = json!({"nope:thing": "x", "dc:title": "Countries"});
        let errors =
            emit_annotations(&mut sink, &subject, properties.as_object().unwrap(), &[]).unwrap();
        assert_eq!(errors, vec!["Unable to expand 'nope:thing' to an absolute IRI".to_string()]);
        assert_eq!(sink.graph().len(), 1);
    }

    #[test]
    fn test_bad_language_tag_keeps_other_properties() {
        let mut sink = GraphSink::new();
        let subject: Subject = sink.blank_node().into();
        let properties = json!({
            "dc:title": {"@value": "x", "@language": "not a tag!"},
            "dc:description": "kept"
        });
        let notes = vec![json!({"rdfs:comment": "also kept"})];
        let errors =
            emit_annotations(&mut sink, &subject, properties.as_object().unwrap(), &notes).unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Invalid language tag 'not a tag!'"), "{}", errors[0]);
        // description, note link, note comment
        assert_eq!(sink.graph().len(), 3);
    }
}
