//! RDF output: the sink interface the converter writes to, two sinks, and
//! per-cell value normalization.

mod cell;
pub mod vocab;

pub use cell::{CellContent, CellParser, CellValue};

use oxrdf::{BlankNode, Graph, Literal, NamedNode, Triple};
use std::io::Write;

use crate::error::CsvwError;

/// Receives the output of a conversion, in emission order.
///
/// Node constructors have default implementations; a sink overrides them
/// to intern or rename nodes.
pub trait RdfSink {
    fn start(&mut self) -> Result<(), CsvwError> {
        Ok(())
    }

    /// `success` is false when any error was recorded during the run.
    fn end(&mut self, success: bool) -> Result<(), CsvwError>;

    fn handle_namespace(&mut self, _prefix: &str, _iri: &str) -> Result<(), CsvwError> {
        Ok(())
    }

    fn handle_triple(&mut self, triple: Triple) -> Result<(), CsvwError>;

    fn iri_node(&mut self, iri: &str) -> Result<NamedNode, CsvwError> {
        NamedNode::new(iri).map_err(|e| CsvwError::Conversion(format!("Invalid IRI <{}>: {}", iri, e)))
    }

    fn blank_node(&mut self) -> BlankNode {
        BlankNode::default()
    }

    fn literal_node(&mut self, value: &str) -> Literal {
        Literal::new_simple_literal(value)
    }

    fn typed_literal_node(&mut self, value: &str, datatype: &str) -> Result<Literal, CsvwError> {
        let datatype = self.iri_node(datatype)?;
        Ok(Literal::new_typed_literal(value, datatype))
    }

    fn lang_literal_node(&mut self, value: &str, language: &str) -> Result<Literal, CsvwError> {
        Literal::new_language_tagged_literal(value, language).map_err(|e| {
            CsvwError::Conversion(format!("Invalid language tag '{}': {}", language, e))
        })
    }
}

/// Collects the output into an in-memory [`Graph`].
#[derive(Debug, Default)]
pub struct GraphSink {
    graph: Graph,
    namespaces: Vec<(String, String)>,
    success: Option<bool>,
}

impl GraphSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn into_graph(self) -> Graph {
        self.graph
    }

    pub fn namespaces(&self) -> &[(String, String)] {
        &self.namespaces
    }

    /// `None` until the conversion has ended.
    pub fn success(&self) -> Option<bool> {
        self.success
    }
}

impl RdfSink for GraphSink {
    fn start(&mut self) -> Result<(), CsvwError> {
        self.success = None;
        Ok(())
    }

    fn end(&mut self, success: bool) -> Result<(), CsvwError> {
        tracing::debug!("Graph sink finished with {} triples", self.graph.len());
        self.success = Some(success);
        Ok(())
    }

    fn handle_namespace(&mut self, prefix: &str, iri: &str) -> Result<(), CsvwError> {
        self.namespaces.push((prefix.to_string(), iri.to_string()));
        Ok(())
    }

    fn handle_triple(&mut self, triple: Triple) -> Result<(), CsvwError> {
        self.graph.insert(&triple);
        Ok(())
    }
}

/// Streams the output as N-Triples.
pub struct NTriplesSink<W: Write> {
    writer: W,
    triples: usize,
}

impl<W: Write> NTriplesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, triples: 0 }
    }

    pub fn triple_count(&self) -> usize {
        self.triples
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RdfSink for NTriplesSink<W> {
    fn end(&mut self, success: bool) -> Result<(), CsvwError> {
        if !success {
            tracing::warn!("Conversion finished with errors; N-Triples output is incomplete");
        }
        self.writer.flush()?;
        Ok(())
    }

    fn handle_triple(&mut self, triple: Triple) -> Result<(), CsvwError> {
        writeln!(self.writer, "{} .", triple)?;
        self.triples += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(sink: &mut impl RdfSink) -> Triple {
        let subject = sink.blank_node();
        let predicate = sink.iri_node("http://example.org/a.csv#name").unwrap();
        let object = sink.lang_literal_node("Andorra", "en").unwrap();
        Triple::new(subject, predicate, object)
    }

    #[test]
    fn test_graph_sink() {
        let mut sink = GraphSink::new();
        sink.start().unwrap();
        sink.handle_namespace("csvw", "http://www.w3.org/ns/csvw#").unwrap();
        let triple = sample(&mut sink);
        sink.handle_triple(triple.clone()).unwrap();
        sink.handle_triple(triple).unwrap();
        sink.end(true).unwrap();

        assert_eq!(sink.graph().len(), 1);
        assert_eq!(sink.namespaces().len(), 1);
        assert_eq!(sink.success(), Some(true));
    }

    #[test]
    fn test_ntriples_sink() {
        let mut sink = NTriplesSink::new(Vec::new());
        let predicate = sink.iri_node("http://example.org/p").unwrap();
        let object = sink
            .typed_literal_node("42", "http://www.w3.org/2001/XMLSchema#integer")
            .unwrap();
        let subject = sink.iri_node("http://example.org/s").unwrap();
        sink.handle_triple(Triple::new(subject, predicate, object)).unwrap();
        sink.end(true).unwrap();

        assert_eq!(sink.triple_count(), 1);
        let output = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            output,
            "<http://example.org/s> <http://example.org/p> \"42\"^^<http://www.w3.org/2001/XMLSchema#integer> .\n"
        );
    }

    #[test]
    fn test_invalid_nodes() {
        let mut sink = GraphSink::new();
        assert!(sink.iri_node("not an iri").is_err());
        assert!(sink.lang_literal_node("x", "not a tag!").is_err());
    }
}
