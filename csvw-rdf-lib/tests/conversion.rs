use anyhow::{ensure, Context, Result};
use csvw_rdf::{
    Converter, ConverterConfig, ConverterMode, FileResolver, GraphSink, InMemoryResolver,
    JsonMetadataParser, NTriplesSink, TableGroup, TableResolver,
};
use oxrdf::dataset::CanonicalizationAlgorithm;
use oxrdf::{Graph, Literal, NamedNodeRef, Term, TermRef};
use oxttl::TurtleParser;
use std::sync::{Arc, Once};
use url::Url;

static INIT: Once = Once::new();

/// Initialize logging exactly once for all tests
fn init_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    });
}

const DATA: &str = "http://example.org/data/";

fn data_url(file: &str) -> Url {
    Url::parse(DATA).and_then(|base| base.join(file)).unwrap()
}

fn file_resolver() -> Arc<dyn TableResolver> {
    Arc::new(FileResolver::new().with_mapping(DATA, "../test-data/"))
}

fn load_turtle(file: &str) -> Result<Graph> {
    let path = format!("../test-data/{}", file);
    let reader = std::fs::File::open(&path).with_context(|| format!("opening {}", path))?;
    let mut graph = Graph::new();
    for triple in TurtleParser::new().for_reader(reader) {
        graph.insert(&triple?);
    }
    Ok(graph)
}

fn ensure_isomorphic(mut actual: Graph, mut expected: Graph) -> Result<()> {
    actual.canonicalize(CanonicalizationAlgorithm::Unstable);
    expected.canonicalize(CanonicalizationAlgorithm::Unstable);
    ensure!(
        actual == expected,
        "graphs differ\nactual:\n{}\nexpected:\n{}",
        actual,
        expected
    );
    Ok(())
}

async fn countries(resolver: Arc<dyn TableResolver>) -> Result<TableGroup> {
    let metadata = std::fs::read_to_string("../test-data/countries-metadata.json")?;
    let parser = JsonMetadataParser::new(data_url("countries-metadata.json"));
    let group = parser
        .with_resolver(resolver)
        .parse_str(&metadata)
        .await?
        .into_value();
    Ok(group)
}

#[tokio::test]
async fn test_minimal_mode_matches_reference() -> Result<()> {
    init_logging();
    let resolver = file_resolver();
    let group = countries(resolver.clone()).await?;

    let mut converter = Converter::new(ConverterConfig::minimal(), resolver);
    let mut sink = GraphSink::new();
    converter.convert_from_metadata(&group, &mut sink).await?;

    ensure!(converter.errors().is_empty(), "{:?}", converter.errors());
    ensure!(sink.graph().len() == 12, "4 triples per row");
    ensure_isomorphic(sink.into_graph(), load_turtle("countries-minimal.ttl")?)
}

#[tokio::test]
async fn test_standard_mode_matches_reference() -> Result<()> {
    init_logging();
    let resolver = file_resolver();
    let group = countries(resolver.clone()).await?;

    let mut converter = Converter::builder()
        .mode(ConverterMode::Standard)
        .resolver(resolver)
        .build();
    let mut sink = GraphSink::new();
    converter.convert_from_metadata(&group, &mut sink).await?;

    ensure!(sink.success() == Some(true));
    ensure_isomorphic(sink.into_graph(), load_turtle("countries-standard.ttl")?)
}

#[tokio::test]
async fn test_bad_cell_is_a_partial_failure() -> Result<()> {
    init_logging();
    let mut resolver = InMemoryResolver::new();
    resolver.add(
        &data_url("countries.csv"),
        "countryCode,latitude,longitude,name\nAD,north,1.6,Andorra\nAF,33.9,67.7,Afghanistan\n",
    );
    let resolver: Arc<dyn TableResolver> = Arc::new(resolver);
    let group = countries(resolver.clone()).await?;

    let mut converter = Converter::new(ConverterConfig::minimal(), resolver);
    let mut sink = GraphSink::new();
    converter.convert_from_metadata(&group, &mut sink).await?;

    ensure!(sink.graph().len() == 3 + 4);
    ensure!(converter.errors().len() == 1);
    let message = &converter.errors()[0].message;
    ensure!(message.contains("row 1") && message.contains("'latitude'"), "{}", message);
    ensure!(sink.success() == Some(false));
    Ok(())
}

#[tokio::test]
async fn test_list_cells_fan_out() -> Result<()> {
    init_logging();
    let mut converter = Converter::new(ConverterConfig::minimal(), file_resolver());
    let mut sink = GraphSink::new();
    converter
        .convert_from_uri(&data_url("colors-metadata.json"), &mut sink)
        .await?;

    let graph = sink.graph();
    ensure!(graph.len() == 3);
    let subject = NamedNodeRef::new_unchecked("http://example.org/data/colors.csv#item-1");
    let color = NamedNodeRef::new_unchecked("http://schema.org/color");
    let mut values: Vec<Term> = graph
        .objects_for_subject_predicate(subject, color)
        .map(TermRef::into_owned)
        .collect();
    values.sort_by_key(|term| term.to_string());
    let expected: Vec<Term> = ["blue", "green", "red"]
        .into_iter()
        .map(|value| Literal::new_simple_literal(value).into())
        .collect();
    ensure!(values == expected, "{:?}", values);
    Ok(())
}

#[tokio::test]
async fn test_csv_without_metadata() -> Result<()> {
    init_logging();
    let config = ConverterConfig::from_file("../test-data/converter-config.jsonc")?;
    let mut converter = Converter::new(config, file_resolver());
    let mut sink = NTriplesSink::new(Vec::new());
    converter
        .convert_from_uri(&data_url("colors.csv"), &mut sink)
        .await?;

    ensure!(sink.triple_count() == 2);
    let output = String::from_utf8(sink.into_inner())?;
    ensure!(
        output.contains("<http://example.org/data/colors.csv#colors> \"red|green|blue\" ."),
        "{}",
        output
    );
    Ok(())
}

#[tokio::test]
async fn test_failing_tables_do_not_stop_the_group() -> Result<()> {
    init_logging();
    let mut resolver = InMemoryResolver::new();
    resolver.add(&data_url("broken.csv"), b"name\n\xff\xfe\n".to_vec());
    resolver.add(&data_url("cities.csv"), "name\nParis\nRome\n");
    let metadata = r#"{
        "@context": "http://www.w3.org/ns/csvw",
        "tables": [
            {"url": "missing.csv"},
            {"url": "broken.csv"},
            {"url": "cities.csv"}
        ]
    }"#;

    let mut converter = Converter::builder()
        .mode(ConverterMode::Standard)
        .resolver(Arc::new(resolver))
        .build();
    let mut sink = GraphSink::new();
    converter
        .convert_with_local_metadata(&data_url("cities-metadata.json"), metadata, &mut sink)
        .await?;

    let errors = converter.errors();
    ensure!(errors.len() == 2, "{:?}", errors);
    ensure!(errors[0].message.contains("missing.csv"), "{}", errors[0].message);
    ensure!(errors[1].message.contains("broken.csv"), "{}", errors[1].message);

    let graph = sink.graph();
    let row = NamedNodeRef::new_unchecked("http://www.w3.org/ns/csvw#row");
    ensure!(graph.triples_for_predicate(row).count() == 2);
    let name = NamedNodeRef::new_unchecked("http://example.org/data/cities.csv#name");
    let mut names: Vec<String> = graph
        .triples_for_predicate(name)
        .map(|triple| triple.object.to_string())
        .collect();
    names.sort();
    ensure!(names == ["\"Paris\"", "\"Rome\""], "{:?}", names);
    ensure!(sink.success() == Some(false));
    Ok(())
}
