//! IRIs emitted by the converter.

pub mod csvw {
    pub const TABLE_GROUP: &str = "http://www.w3.org/ns/csvw#TableGroup";
    pub const TABLE_CLASS: &str = "http://www.w3.org/ns/csvw#Table";
    pub const ROW_CLASS: &str = "http://www.w3.org/ns/csvw#Row";
    pub const TABLE: &str = "http://www.w3.org/ns/csvw#table";
    pub const ROW: &str = "http://www.w3.org/ns/csvw#row";
    pub const URL: &str = "http://www.w3.org/ns/csvw#url";
    pub const ROWNUM: &str = "http://www.w3.org/ns/csvw#rownum";
    pub const DESCRIBES: &str = "http://www.w3.org/ns/csvw#describes";
    pub const NOTE: &str = "http://www.w3.org/ns/csvw#note";
}

pub mod rdf {
    pub const TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
    pub const FIRST: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#first";
    pub const REST: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#rest";
    pub const NIL: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#nil";
}

pub mod xsd {
    pub const STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
    pub const BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
    pub const INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
    pub const DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
}
