use oxrdf::{NamedNode, Subject, Term, Triple};
use url::Url;

use super::value_processor::{canonical_value, literal_for};
use super::Converter;
use crate::config::ConverterMode;
use crate::error::CsvwError;
use crate::metadata::{
    csvw_context, ColumnDescription, LanguageTaggedString, Table, TableGroup, Trim,
};
use crate::rdf::vocab::{csvw, rdf, xsd};
use crate::rdf::{CellContent, CellParser, CellValue, RdfSink};
use crate::template::UriTemplate;

/// Position of the row being converted.
#[derive(Debug, Clone, Copy)]
struct RowPosition {
    /// 1-based over data rows.
    number: usize,
    /// 1-based over every record of the file, header and skipped rows included.
    source: usize,
}

/// Everything the cells of one row need to expand their templates.
struct RowContext<'a> {
    table: &'a Table,
    columns: &'a [ColumnDescription],
    cells: &'a [CellValue],
    bindings: &'a [Option<String>],
    position: RowPosition,
    skip_columns: usize,
}

impl RowContext<'_> {
    fn lookup(&self, column: usize, variable: &str) -> Option<String> {
        match variable {
            "_row" => Some(self.position.number.to_string()),
            "_sourceRow" => Some(self.position.source.to_string()),
            "_column" => Some((column + 1).to_string()),
            "_sourceColumn" => Some((column + 1 + self.skip_columns).to_string()),
            "_name" => {
                let name = &self.columns[column].name;
                Some(
                    urlencoding::decode(name)
                        .map(|decoded| decoded.into_owned())
                        .unwrap_or_else(|_| name.clone()),
                )
            }
            name => self
                .columns
                .iter()
                .position(|c| c.name == name)
                .and_then(|index| self.bindings[index].clone()),
        }
    }

    /// Expands `template` for the cell in `column` and resolves it against
    /// the table URL. `Ok(None)` when a variable has no value.
    fn resolve(
        &self,
        sink: &mut dyn RdfSink,
        template: &UriTemplate,
        column: usize,
    ) -> Result<Option<NamedNode>, CsvwError> {
        let expanded = match template.expand(|variable| self.lookup(column, variable)) {
            Ok(expanded) => expanded,
            Err(e) => {
                tracing::debug!(
                    "Skipping cell at row {} of {}: {}",
                    self.position.number,
                    self.table.url,
                    e
                );
                return Ok(None);
            }
        };
        let expanded = csvw_context().expand_iri(&expanded);
        let url = self.table.url.join(&expanded).map_err(|e| {
            CsvwError::Conversion(format!("'{}' is not a valid URI: {}", expanded, e))
        })?;
        sink.iri_node(url.as_str()).map(Some)
    }
}

impl Converter {
    /// Runs the row engine over one table body and returns the number of data
    /// rows converted. Cell errors are recorded and skipped; a malformed CSV
    /// record ends the table with an error.
    pub(crate) fn convert_table(
        &mut self,
        group: &TableGroup,
        table: &Table,
        table_node: Option<&Subject>,
        body: &[u8],
        sink: &mut dyn RdfSink,
    ) -> Result<usize, CsvwError> {
        let dialect = &table.dialect;
        if !dialect.encoding.eq_ignore_ascii_case("utf-8") {
            self.state.add_warning(
                format!(
                    "Encoding '{}' is not supported, reading {} as UTF-8",
                    dialect.encoding, table.url
                ),
                Some(table.url.to_string()),
            );
        }
        let text = std::str::from_utf8(body).map_err(|e| {
            CsvwError::Conversion(format!("{} is not valid UTF-8: {}", table.url, e))
        })?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        for message in dialect.unsupported_settings() {
            self.state
                .add_warning(format!("{}: {}", table.url, message), Some(table.url.to_string()));
        }

        let standard = self.config.mode == ConverterMode::Standard;
        let suppress_string_datatype = self.config.suppress_string_datatype;
        let trim = dialect.effective_trim();
        let skip_columns = dialect.skip_columns;
        let header_rows = dialect.header_row_count();

        let mut records = dialect
            .reader_builder()
            .from_reader(text.as_bytes())
            .into_records();
        let mut columns: Vec<ColumnDescription> = table.columns().to_vec();
        let infer_columns = columns.is_empty();
        let mut source_row = 0;

        for _ in 0..dialect.skip_rows + header_rows {
            let Some(record) = records.next() else {
                break;
            };
            let record = record?;
            source_row += 1;
            if source_row > dialect.skip_rows && infer_columns {
                let fields = row_fields(&record, skip_columns, trim);
                add_header_titles(&mut columns, &fields, table.inherited.lang.as_deref());
            }
        }

        let mut row_number = 0;
        let mut pending: Option<csv::StringRecord> = None;
        loop {
            // Parsers borrow the columns, so they are rebuilt only when a
            // row turns out wider than every row before it.
            let parsers: Vec<CellParser> = columns
                .iter()
                .map(|column| CellParser::new(column.chain(table, group)))
                .collect();
            let physical = columns.iter().filter(|c| !c.virtual_column).count();

            let wider = loop {
                let record = match pending.take() {
                    Some(record) => record,
                    None => match records.next() {
                        Some(record) => {
                            source_row += 1;
                            record?
                        }
                        None => break None,
                    },
                };
                let fields = row_fields(&record, skip_columns, trim);
                if dialect.skip_blank_rows && fields.iter().all(|field| field.is_empty()) {
                    tracing::debug!("Skipping blank row {} of {}", source_row, table.url);
                    continue;
                }
                let width = fields.len();
                if width > physical {
                    drop(fields);
                    pending = Some(record);
                    break Some(width);
                }

                row_number += 1;
                let position = RowPosition {
                    number: row_number,
                    source: source_row,
                };
                tracing::debug!("Converting row {} of {}", row_number, table.url);

                let row_node = match (standard, table_node) {
                    (true, Some(table_node)) => {
                        Some(emit_row(sink, table_node, &table.url, position)?)
                    }
                    _ => None,
                };

                let cells: Vec<CellValue> = columns
                    .iter()
                    .zip(&parsers)
                    .enumerate()
                    .map(|(index, (column, parser))| {
                        let raw = if column.virtual_column {
                            ""
                        } else {
                            fields.get(index).copied().unwrap_or("")
                        };
                        parser.parse(raw)
                    })
                    .collect();
                let bindings: Vec<Option<String>> = cells
                    .iter()
                    .zip(&parsers)
                    .map(|(cell, parser)| binding_value(cell, parser))
                    .collect();

                let context = RowContext {
                    table,
                    columns: &columns,
                    cells: &cells,
                    bindings: &bindings,
                    position,
                    skip_columns,
                };
                let default_subject: Subject = sink.blank_node().into();
                let mut described: Vec<Subject> = Vec::new();

                for (index, column) in columns.iter().enumerate() {
                    if column.suppress_output {
                        continue;
                    }
                    for message in &cells[index].errors {
                        self.cell_error(position, &column.name, message);
                    }

                    let emitted = emit_cell(
                        sink,
                        &context,
                        &parsers[index],
                        index,
                        &default_subject,
                        row_node.as_ref(),
                        &mut described,
                        suppress_string_datatype,
                    );
                    match emitted {
                        Ok(errors) => {
                            for message in errors {
                                self.cell_error(position, &column.name, &message);
                            }
                        }
                        Err(CsvwError::Io(e)) => return Err(e.into()),
                        Err(e) => self.cell_error(position, &column.name, &e.to_string()),
                    }
                }

                self.report_progress(row_number);
            };

            match wider {
                Some(width) => {
                    drop(parsers);
                    widen(&mut columns, width);
                }
                None => return Ok(row_number),
            }
        }
    }

    fn cell_error(&mut self, position: RowPosition, column: &str, message: &str) {
        self.record_error(
            format!(
                "Conversion error at row {}, column '{}': {}",
                position.number, column, message
            ),
            Some(format!("row {}", position.source)),
        );
    }
}

fn row_fields(record: &csv::StringRecord, skip_columns: usize, trim: Trim) -> Vec<&str> {
    record
        .iter()
        .skip(skip_columns)
        .map(|field| trim.apply(field))
        .collect()
}

/// Adds one header row to the titles of the inferred columns, creating a
/// column named after the title where there is none yet.
fn add_header_titles(columns: &mut Vec<ColumnDescription>, fields: &[&str], lang: Option<&str>) {
    for (index, title) in fields.iter().enumerate() {
        let title = LanguageTaggedString {
            value: title.to_string(),
            language: lang.map(str::to_string),
        };
        match columns.get_mut(index) {
            Some(column) => column.titles.push(title),
            None if title.value.is_empty() => columns.push(ColumnDescription::positional(index + 1)),
            None => {
                let mut column =
                    ColumnDescription::named(urlencoding::encode(&title.value).into_owned());
                column.titles.push(title);
                columns.push(column);
            }
        }
    }
}

/// Materializes `_col.N` columns until there is one for each of `fields`
/// source fields. New columns go before the first virtual column.
fn widen(columns: &mut Vec<ColumnDescription>, fields: usize) {
    loop {
        let physical = columns.iter().filter(|c| !c.virtual_column).count();
        if physical >= fields {
            break;
        }
        let column = ColumnDescription::positional(physical + 1);
        tracing::debug!("Adding column {} for an undeclared field", column.name);
        columns.insert(physical, column);
    }
}

/// Value bound to a column's name in URI templates: the canonical value of a
/// single cell, or the normalized string of a list.
fn binding_value(cell: &CellValue, parser: &CellParser) -> Option<String> {
    match &cell.content {
        CellContent::Null => None,
        CellContent::List(_) => Some(cell.normalized.clone()),
        CellContent::Single(value) => Some(
            parser
                .chain()
                .datatype()
                .and_then(|datatype| canonical_value(value, datatype).ok())
                .unwrap_or_else(|| value.clone()),
        ),
    }
}

fn emit_row(
    sink: &mut dyn RdfSink,
    table_node: &Subject,
    table_url: &Url,
    position: RowPosition,
) -> Result<Subject, CsvwError> {
    let row: Subject = sink.blank_node().into();
    let has_row = sink.iri_node(csvw::ROW)?;
    sink.handle_triple(Triple::new(table_node.clone(), has_row, row.clone()))?;

    let rdf_type = sink.iri_node(rdf::TYPE)?;
    let class = sink.iri_node(csvw::ROW_CLASS)?;
    sink.handle_triple(Triple::new(row.clone(), rdf_type, class))?;

    let rownum = sink.iri_node(csvw::ROWNUM)?;
    let number = sink.typed_literal_node(&position.number.to_string(), xsd::INTEGER)?;
    sink.handle_triple(Triple::new(row.clone(), rownum, number))?;

    let mut row_url = table_url.clone();
    row_url.set_fragment(Some(&format!("row={}", position.source)));
    let url = sink.iri_node(csvw::URL)?;
    let location = sink.iri_node(row_url.as_str())?;
    sink.handle_triple(Triple::new(row.clone(), url, location))?;
    Ok(row)
}

/// Emits the triples of one cell. Values that fail to convert are left out
/// and returned as messages; the other values of the cell are still emitted.
#[allow(clippy::too_many_arguments)]
fn emit_cell(
    sink: &mut dyn RdfSink,
    context: &RowContext<'_>,
    parser: &CellParser<'_>,
    column: usize,
    default_subject: &Subject,
    row_node: Option<&Subject>,
    described: &mut Vec<Subject>,
    suppress_string_datatype: bool,
) -> Result<Vec<String>, CsvwError> {
    let chain = parser.chain();
    let cell = &context.cells[column];

    let subject = match chain.about_url() {
        Some(template) => match context.resolve(sink, template, column)? {
            Some(node) => Subject::from(node),
            None => return Ok(Vec::new()),
        },
        None => default_subject.clone(),
    };
    if let Some(row_node) = row_node {
        if !described.contains(&subject) {
            let describes = sink.iri_node(csvw::DESCRIBES)?;
            sink.handle_triple(Triple::new(row_node.clone(), describes, subject.clone()))?;
            described.push(subject.clone());
        }
    }

    let predicate = match chain.property_url() {
        Some(template) => match context.resolve(sink, template, column)? {
            Some(node) => node,
            None => return Ok(Vec::new()),
        },
        None => {
            let mut url = context.table.url.clone();
            url.set_fragment(Some(&context.columns[column].name));
            sink.iri_node(url.as_str())?
        }
    };

    if let Some(template) = chain.value_url() {
        if cell.is_null() {
            return Ok(Vec::new());
        }
        if let Some(object) = context.resolve(sink, template, column)? {
            sink.handle_triple(Triple::new(subject, predicate, object))?;
        }
        return Ok(Vec::new());
    }

    let mut errors = Vec::new();
    let mut objects: Vec<Term> = Vec::new();
    for value in cell.values() {
        match literal_for(
            sink,
            value,
            chain.datatype(),
            chain.lang(),
            suppress_string_datatype,
        ) {
            Ok(literal) => objects.push(literal.into()),
            Err(CsvwError::Io(e)) => return Err(e.into()),
            Err(e) => errors.push(message_of(e)),
        }
    }

    if cell.is_list() && chain.ordered() {
        let head = emit_collection(sink, objects)?;
        sink.handle_triple(Triple::new(subject, predicate, head))?;
    } else {
        for object in objects {
            sink.handle_triple(Triple::new(subject.clone(), predicate.clone(), object))?;
        }
    }
    Ok(errors)
}

fn message_of(error: CsvwError) -> String {
    match error {
        CsvwError::Conversion(message) => message,
        other => other.to_string(),
    }
}

/// Writes `items` as an `rdf:first`/`rdf:rest` list and returns its head.
fn emit_collection(sink: &mut dyn RdfSink, items: Vec<Term>) -> Result<Term, CsvwError> {
    let nil = sink.iri_node(rdf::NIL)?;
    if items.is_empty() {
        return Ok(nil.into());
    }
    let first = sink.iri_node(rdf::FIRST)?;
    let rest = sink.iri_node(rdf::REST)?;
    let nodes: Vec<Subject> = items.iter().map(|_| sink.blank_node().into()).collect();
    for (index, item) in items.into_iter().enumerate() {
        let node = &nodes[index];
        sink.handle_triple(Triple::new(node.clone(), first.clone(), item))?;
        let next: Term = match nodes.get(index + 1) {
            Some(next) => next.clone().into(),
            None => nil.clone().into(),
        };
        sink.handle_triple(Triple::new(node.clone(), rest.clone(), next))?;
    }
    Ok(nodes[0].clone().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConverterConfig;
    use crate::metadata::{DatatypeDescription, Schema};
    use crate::rdf::GraphSink;
    use crate::resolver::InMemoryResolver;
    use oxrdf::{Literal, NamedNodeRef, TermRef};
    use std::sync::Arc;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn minimal() -> Converter {
        Converter::new(ConverterConfig::minimal(), Arc::new(InMemoryResolver::new()))
    }

    fn group_with(columns: Vec<ColumnDescription>) -> TableGroup {
        let mut group = TableGroup::for_table_url(url("http://example.org/t.csv"));
        group.tables[0].schema = Some(Schema {
            columns,
            ..Default::default()
        });
        group
    }

    fn convert(converter: &mut Converter, group: &TableGroup, body: &str) -> GraphSink {
        let mut sink = GraphSink::new();
        converter
            .convert_table(group, &group.tables[0], None, body.as_bytes(), &mut sink)
            .unwrap();
        sink
    }

    fn typed(column: &str, base: &str) -> ColumnDescription {
        let mut column = ColumnDescription::named(column);
        column.inherited.datatype = Some(DatatypeDescription::from_base(base));
        column
    }

    #[test]
    fn test_inferred_columns_from_header() {
        let group = TableGroup::for_table_url(url("http://example.org/t.csv"));
        let sink = convert(&mut minimal(), &group, "\u{feff}Country Name,code\nAndorra,AD\n");
        let graph = sink.graph();
        assert_eq!(graph.len(), 2);
        let predicate = NamedNodeRef::new_unchecked("http://example.org/t.csv#Country%20Name");
        assert_eq!(graph.triples_for_predicate(predicate).count(), 1);
    }

    #[test]
    fn test_widening_adds_positional_columns() {
        let mut virtual_column = ColumnDescription::named("kind");
        virtual_column.virtual_column = true;
        virtual_column.inherited.default = Some("country".to_string());
        let group = group_with(vec![ColumnDescription::named("code"), virtual_column]);

        let sink = convert(&mut minimal(), &group, "code,name\nAD,Andorra\n");
        let graph = sink.graph();
        assert_eq!(graph.len(), 3);
        let extra = NamedNodeRef::new_unchecked("http://example.org/t.csv#_col.2");
        let object = graph
            .triples_for_predicate(extra)
            .next()
            .map(|t| t.object.into_owned());
        assert_eq!(object, Some(Term::from(Literal::new_simple_literal("Andorra"))));
    }

    #[test]
    fn test_wider_row_in_the_middle_of_a_table() {
        let group = TableGroup::for_table_url(url("http://example.org/t.csv"));
        let mut converter = minimal();
        let mut sink = GraphSink::new();
        let rows = converter
            .convert_table(&group, &group.tables[0], None, b"a\n1\n2,3\n4\n", &mut sink)
            .unwrap();
        assert_eq!(rows, 3);
        let graph = sink.graph();
        assert_eq!(graph.len(), 4);
        let a = NamedNodeRef::new_unchecked("http://example.org/t.csv#a");
        assert_eq!(graph.triples_for_predicate(a).count(), 3);
        let extra = NamedNodeRef::new_unchecked("http://example.org/t.csv#_col.2");
        assert_eq!(graph.triples_for_predicate(extra).count(), 1);
    }

    #[test]
    fn test_multi_byte_delimiter_warns() {
        let mut group = group_with(vec![ColumnDescription::named("name")]);
        group.tables[0].dialect.delimiter = "||".to_string();
        let mut converter = minimal();
        let sink = convert(&mut converter, &group, "name\nAndorra\n");
        assert_eq!(sink.graph().len(), 1);
        assert_eq!(converter.warnings().len(), 1);
        assert!(converter.warnings()[0].message.contains("delimiter '||'"));
    }

    #[test]
    fn test_cell_error_keeps_the_row() {
        let group = group_with(vec![ColumnDescription::named("code"), typed("latitude", "decimal")]);
        let mut converter = minimal();
        let sink = convert(&mut converter, &group, "code,latitude\nAD,north\nAF,33.9\n");

        assert_eq!(sink.graph().len(), 3);
        assert_eq!(converter.errors().len(), 1);
        assert_eq!(
            converter.errors()[0].message,
            "Conversion error at row 1, column 'latitude': Could not parse 'north' as a number"
        );
    }

    #[test]
    fn test_templates_and_suppressed_columns() {
        let mut code = ColumnDescription::named("code");
        code.suppress_output = true;
        let mut name = ColumnDescription::named("name");
        name.inherited.property_url = Some(UriTemplate::new("schema:name"));
        let mut capital = ColumnDescription::named("capital");
        capital.inherited.value_url = Some(UriTemplate::new("http://example.org/city/{capital}"));
        let mut group = group_with(vec![code, name, capital]);
        group.tables[0].inherited.about_url = Some(UriTemplate::new("#country-{code}"));

        let sink = convert(&mut minimal(), &group, "code,name,capital\nAD,Andorra,Andorra la Vella\nXX,Nowhere,\n");
        let graph = sink.graph();
        assert_eq!(graph.len(), 3);

        let subject = NamedNodeRef::new_unchecked("http://example.org/t.csv#country-AD");
        let name = NamedNodeRef::new_unchecked("http://schema.org/name");
        assert!(graph.object_for_subject_predicate(subject, name).is_some());
        let capital = NamedNodeRef::new_unchecked("http://example.org/t.csv#capital");
        assert_eq!(
            graph.object_for_subject_predicate(subject, capital),
            Some(TermRef::NamedNode(NamedNodeRef::new_unchecked(
                "http://example.org/city/Andorra%20la%20Vella"
            )))
        );
    }

    #[test]
    fn test_row_variables() {
        let mut id = ColumnDescription::named("id");
        id.virtual_column = true;
        id.inherited.about_url = Some(UriTemplate::new("#row-{_row}-{_sourceRow}"));
        id.inherited.value_url = Some(UriTemplate::new("#col-{_column}"));
        id.inherited.default = Some("x".to_string());
        let mut group = group_with(vec![ColumnDescription::named("a"), id]);
        group.tables[0].dialect.skip_rows = 1;

        let sink = convert(&mut minimal(), &group, "preamble\na\n1\n");
        let subject = NamedNodeRef::new_unchecked("http://example.org/t.csv#row-1-3");
        assert_eq!(sink.graph().triples_for_subject(subject).count(), 1);
    }

    #[test]
    fn test_ordered_list_is_a_collection() {
        let mut colors = ColumnDescription::named("colors");
        colors.inherited.separator = Some("|".to_string());
        colors.inherited.ordered = Some(true);
        let group = group_with(vec![colors]);

        let sink = convert(&mut minimal(), &group, "colors\nred|green\n");
        let graph = sink.graph();
        // value triple + 2 * (first, rest)
        assert_eq!(graph.len(), 5);
        let first = NamedNodeRef::new_unchecked(rdf::FIRST);
        assert_eq!(graph.triples_for_predicate(first).count(), 2);
    }

    #[test]
    fn test_skip_blank_rows_and_columns() {
        let mut group = group_with(vec![ColumnDescription::named("name")]);
        group.tables[0].dialect.skip_blank_rows = true;
        group.tables[0].dialect.skip_columns = 1;

        let mut converter = minimal();
        let mut sink = GraphSink::new();
        let rows = converter
            .convert_table(
                &group,
                &group.tables[0],
                None,
                b"id,name\n1,Andorra\n,\n2,Angola\n",
                &mut sink,
            )
            .unwrap();
        assert_eq!(rows, 2);
        assert_eq!(sink.graph().len(), 2);
    }

    #[test]
    fn test_malformed_body_fails_the_table() {
        let group = group_with(vec![ColumnDescription::named("name")]);
        let mut sink = GraphSink::new();
        let result =
            minimal().convert_table(&group, &group.tables[0], None, &[0xff, 0xfe, 0x00], &mut sink);
        assert!(result.is_err());
    }
}
