// Default knowledge-graph queries
//
// Both select the same variable names so rows from either source map onto
// the same field keys.

pub const DEFAULT_WIKIDATA_ENDPOINT: &str = "https://query.wikidata.org/sparql";
pub const DEFAULT_DBPEDIA_ENDPOINT: &str = "https://dbpedia.org/sparql";

pub const DEFAULT_WIKIDATA_QUERY: &str = r#"SELECT DISTINCT ?country_label ?capital_label ?currency_label ?population
       ?flag_image ?anthem_audio ?official_Language_label ?continent_label ?highest_point_label
WHERE {
  ?country wdt:P31 wd:Q3624078 .
  FILTER NOT EXISTS { ?country wdt:P31 wd:Q3024240 }
  OPTIONAL { ?country wdt:P36 ?capital . }
  OPTIONAL { ?country wdt:P38 ?currency . }
  OPTIONAL { ?country wdt:P1082 ?population . }
  OPTIONAL { ?country wdt:P41 ?flag_image . }
  OPTIONAL { ?country wdt:P85 ?anthem . ?anthem wdt:P51 ?anthem_audio . }
  OPTIONAL { ?country wdt:P37 ?official_language . }
  OPTIONAL { ?country wdt:P30 ?continent . }
  OPTIONAL { ?country wdt:P610 ?highest_point . }
  SERVICE wikibase:label {
    bd:serviceParam wikibase:language "en" .
    ?country rdfs:label ?country_label .
    ?capital rdfs:label ?capital_label .
    ?currency rdfs:label ?currency_label .
    ?official_language rdfs:label ?official_Language_label .
    ?continent rdfs:label ?continent_label .
    ?highest_point rdfs:label ?highest_point_label .
  }
}"#;

pub const DEFAULT_DBPEDIA_QUERY: &str = r#"PREFIX dbo: <http://dbpedia.org/ontology/>
PREFIX dbp: <http://dbpedia.org/property/>
PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>
SELECT DISTINCT ?country_label ?capital_label ?currency_label ?population
       ?flag_image ?official_Language_label ?continent_label ?highest_point_label
WHERE {
  ?country a dbo:Country ;
           rdfs:label ?country_label ;
           dbo:capital ?capital .
  FILTER (lang(?country_label) = "en")
  FILTER NOT EXISTS { ?country dbo:dissolutionYear ?dissolved }
  OPTIONAL { ?capital rdfs:label ?capital_label . FILTER (lang(?capital_label) = "en") }
  OPTIONAL { ?country dbo:currency ?currency . ?currency rdfs:label ?currency_label . FILTER (lang(?currency_label) = "en") }
  OPTIONAL { ?country dbo:populationTotal ?population . }
  OPTIONAL { ?country dbp:imageFlag ?flag_image . }
  OPTIONAL { ?country dbo:officialLanguage ?language . ?language rdfs:label ?official_Language_label . FILTER (lang(?official_Language_label) = "en") }
  OPTIONAL { ?country dbo:continent ?continent . ?continent rdfs:label ?continent_label . FILTER (lang(?continent_label) = "en") }
  OPTIONAL { ?country dbo:highestPlace ?highest . ?highest rdfs:label ?highest_point_label . FILTER (lang(?highest_point_label) = "en") }
}"#;
