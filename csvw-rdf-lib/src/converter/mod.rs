//! Conversion of annotated tables to RDF.
//!
//! A [`Converter`] walks a [`TableGroup`], fetches every table body through
//! its [`TableResolver`] and writes triples to an [`RdfSink`]. Cell level
//! problems are collected and reported at the end; they never stop a run.

mod common;
mod discovery;
mod processor;
mod value_processor;

use oxrdf::{Subject, Triple};
use std::sync::Arc;
use url::Url;

use crate::config::{ConverterConfig, ConverterMode};
use crate::datatype::{CSVW_NS, RDF_NS, XSD_NS};
use crate::error::{CsvwError, ProcessingMessage, ProcessingOutcome, ProcessingState};
use crate::metadata::{Table, TableGroup};
use crate::rdf::vocab::{csvw, rdf};
use crate::rdf::RdfSink;
use crate::resolver::TableResolver;

/// Receives every conversion error message as it is recorded.
pub type ErrorSink = Box<dyn Fn(&str) + Send + Sync>;

/// Called with the number of data rows converted so far, every
/// `reportInterval` rows.
pub type ProgressCallback = Box<dyn Fn(usize) + Send + Sync>;

pub struct Converter {
    config: ConverterConfig,
    resolver: Arc<dyn TableResolver>,
    error_sink: Option<ErrorSink>,
    progress: Option<ProgressCallback>,
    state: ProcessingState,
}

impl Converter {
    pub fn new(config: ConverterConfig, resolver: Arc<dyn TableResolver>) -> Self {
        Self {
            config,
            resolver,
            error_sink: None,
            progress: None,
            state: ProcessingState::new(),
        }
    }

    pub fn builder() -> ConverterBuilder {
        ConverterBuilder::default()
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Errors recorded by the last run, in the order they occurred.
    pub fn errors(&self) -> &[ProcessingMessage] {
        self.state.get_errors()
    }

    pub fn warnings(&self) -> &[ProcessingMessage] {
        self.state.get_warnings()
    }

    pub fn outcome(&self) -> ProcessingOutcome {
        ProcessingOutcome::from_state(self.state.clone())
    }

    /// Converts every table of `group` that is not suppressed.
    pub async fn convert_from_metadata(
        &mut self,
        group: &TableGroup,
        sink: &mut dyn RdfSink,
    ) -> Result<(), CsvwError> {
        self.state = ProcessingState::new();
        self.run(group, sink).await
    }

    async fn run(&mut self, group: &TableGroup, sink: &mut dyn RdfSink) -> Result<(), CsvwError> {
        let standard = self.config.mode == ConverterMode::Standard;
        tracing::info!(
            "Converting table group with {} table(s) in {:?} mode",
            group.tables.len(),
            self.config.mode
        );

        sink.start()?;
        for (prefix, iri) in [("rdf", RDF_NS), ("csvw", CSVW_NS), ("xsd", XSD_NS)] {
            sink.handle_namespace(prefix, iri)?;
        }

        let group_node = if standard {
            let node = emit_group(group, sink);
            let node = self.absorb(node, "table group")?;
            if let Some(node) = &node {
                let annotated =
                    common::emit_annotations(sink, node, &group.common_properties, &group.notes);
                self.record_annotation_errors(annotated, "table group")?;
            }
            node
        } else {
            None
        };

        for table in &group.tables {
            if table.suppress_output {
                tracing::debug!("Skipping suppressed table {}", table.url);
                continue;
            }
            tracing::info!("Converting table {}", table.url);

            let body = match self.resolver.resolve(&table.url).await {
                Ok(body) => body,
                Err(e) => {
                    self.record_error(
                        format!("Failed to resolve table {}: {}", table.url, e),
                        Some(table.url.to_string()),
                    );
                    continue;
                }
            };

            let table_node = match &group_node {
                Some(group_node) => {
                    let node = emit_table(group_node, table, sink);
                    let node = self.absorb(node, table.url.as_str())?;
                    if let Some(node) = &node {
                        let annotated = common::emit_annotations(
                            sink,
                            node,
                            &table.common_properties,
                            &table.notes,
                        );
                        self.record_annotation_errors(annotated, table.url.as_str())?;
                    }
                    node
                }
                None => None,
            };

            let converted = self.convert_table(group, table, table_node.as_ref(), &body, sink);
            match converted {
                Ok(rows) => tracing::info!("Converted {} row(s) of {}", rows, table.url),
                Err(CsvwError::Io(e)) => return Err(e.into()),
                Err(e) => self.record_error(
                    format!("Failed to convert table {}: {}", table.url, e),
                    Some(table.url.to_string()),
                ),
            }
        }

        let success = !self.state.has_errors();
        sink.end(success)?;
        if success {
            tracing::info!("Conversion completed successfully");
        } else {
            tracing::warn!(
                "Conversion completed with {} error(s)",
                self.state.get_errors().len()
            );
        }
        Ok(())
    }

    /// I/O failures of the sink end the run; anything else is recorded
    /// against `context` and the run goes on without the node.
    fn absorb(
        &mut self,
        result: Result<Subject, CsvwError>,
        context: &str,
    ) -> Result<Option<Subject>, CsvwError> {
        match result {
            Ok(node) => Ok(Some(node)),
            Err(CsvwError::Io(e)) => Err(e.into()),
            Err(e) => {
                self.record_error(
                    format!("Failed to describe {}: {}", context, e),
                    Some(context.to_string()),
                );
                Ok(None)
            }
        }
    }

    /// Records the notes and common properties of `context` that were left out.
    fn record_annotation_errors(
        &mut self,
        result: Result<Vec<String>, CsvwError>,
        context: &str,
    ) -> Result<(), CsvwError> {
        match result {
            Ok(errors) => {
                for message in errors {
                    self.record_error(
                        format!("Failed to annotate {}: {}", context, message),
                        Some(context.to_string()),
                    );
                }
                Ok(())
            }
            Err(CsvwError::Io(e)) => Err(e.into()),
            Err(e) => {
                self.record_error(
                    format!("Failed to annotate {}: {}", context, e),
                    Some(context.to_string()),
                );
                Ok(())
            }
        }
    }

    pub(crate) fn record_error(&mut self, message: String, source: Option<String>) {
        tracing::error!("{}", message);
        if let Some(error_sink) = &self.error_sink {
            error_sink(&message);
        }
        self.state.add_error(message, source);
    }

    pub(crate) fn report_progress(&self, rows: usize) {
        let interval = self.config.report_interval;
        if interval > 0 && rows % interval == 0 {
            tracing::debug!("Converted {} rows", rows);
            if let Some(progress) = &self.progress {
                progress(rows);
            }
        }
    }
}

fn emit_group(
    group: &TableGroup,
    sink: &mut dyn RdfSink,
) -> Result<Subject, CsvwError> {
    let node = node_for(sink, group.id.as_ref())?;
    let rdf_type = sink.iri_node(rdf::TYPE)?;
    let class = sink.iri_node(csvw::TABLE_GROUP)?;
    sink.handle_triple(Triple::new(node.clone(), rdf_type, class))?;
    Ok(node)
}

fn emit_table(
    group_node: &Subject,
    table: &Table,
    sink: &mut dyn RdfSink,
) -> Result<Subject, CsvwError> {
    let node = node_for(sink, table.id.as_ref())?;
    let has_table = sink.iri_node(csvw::TABLE)?;
    sink.handle_triple(Triple::new(group_node.clone(), has_table, node.clone()))?;
    let rdf_type = sink.iri_node(rdf::TYPE)?;
    let class = sink.iri_node(csvw::TABLE_CLASS)?;
    sink.handle_triple(Triple::new(node.clone(), rdf_type, class))?;
    let url = sink.iri_node(csvw::URL)?;
    let location = sink.iri_node(table.url.as_str())?;
    sink.handle_triple(Triple::new(node.clone(), url, location))?;
    Ok(node)
}

fn node_for(sink: &mut dyn RdfSink, id: Option<&Url>) -> Result<Subject, CsvwError> {
    Ok(match id {
        Some(id) => sink.iri_node(id.as_str())?.into(),
        None => sink.blank_node().into(),
    })
}

/// Assembles a [`Converter`]. Without a resolver, tables are read with a
/// default [`crate::FileResolver`].
#[derive(Default)]
pub struct ConverterBuilder {
    config: ConverterConfig,
    resolver: Option<Arc<dyn TableResolver>>,
    error_sink: Option<ErrorSink>,
    progress: Option<ProgressCallback>,
}

impl ConverterBuilder {
    pub fn config(mut self, config: ConverterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn mode(mut self, mode: ConverterMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn TableResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn error_sink(mut self, sink: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.error_sink = Some(Box::new(sink));
        self
    }

    pub fn progress(mut self, callback: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    pub fn build(self) -> Converter {
        let resolver = self
            .resolver
            .unwrap_or_else(|| Arc::new(crate::resolver::FileResolver::new()));
        Converter {
            config: self.config,
            resolver,
            error_sink: self.error_sink,
            progress: self.progress,
            state: ProcessingState::new(),
        }
    }
}
