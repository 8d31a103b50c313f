//! Source wiring and snapshot fetch.

use std::time::Duration;

use chrono::{DateTime, Utc};
use geoquiz_config::{SourceMode, SourceSettings};
use geoquiz_recon::{build_snapshot, SnapshotBuild};
use geoquiz_sparql_client::{RetryPolicy, SourceClient, SparqlSource};

use crate::error::PipelineError;

/// Sources for the configured mode, primary first.
pub fn build_sources(settings: &SourceSettings) -> Result<Vec<Box<dyn SourceClient>>, PipelineError> {
    let timeout = Duration::from_secs(settings.timeout_secs);
    let policy = RetryPolicy {
        max_retries: settings.max_retries,
        ..RetryPolicy::default()
    };

    let wikidata = || {
        SparqlSource::new("wikidata", &settings.wikidata_endpoint, &settings.wikidata_query, timeout)
            .map(|s| Box::new(s.with_policy(policy)) as Box<dyn SourceClient>)
    };
    let dbpedia = || {
        SparqlSource::new("dbpedia", &settings.dbpedia_endpoint, &settings.dbpedia_query, timeout)
            .map(|s| Box::new(s.with_policy(policy)) as Box<dyn SourceClient>)
    };

    let sources = match settings.mode {
        SourceMode::Wikidata => vec![wikidata()?],
        SourceMode::Dbpedia => vec![dbpedia()?],
        SourceMode::Both => vec![wikidata()?, dbpedia()?],
    };
    Ok(sources)
}

/// Fetch every source, then unify and merge into one snapshot.
///
/// All-or-nothing: the first failing source aborts the fetch, and a
/// snapshot without countries is refused. Callers mutate nothing before
/// this returns `Ok`.
pub fn fetch_snapshot(
    sources: &[Box<dyn SourceClient>],
    taken_at: DateTime<Utc>,
) -> Result<SnapshotBuild, PipelineError> {
    let mut rows = Vec::with_capacity(sources.len());
    for source in sources {
        log::info!("fetching {}", source.name());
        let fetched = source.fetch().map_err(|e| {
            log::error!("{}: fetch failed: {}", source.name(), e);
            PipelineError::Source(e)
        })?;
        rows.push(fetched);
    }

    let build = build_snapshot(&rows, taken_at);
    if build.snapshot.is_empty() {
        log::error!("snapshot is empty ({} source(s) fetched)", sources.len());
        return Err(PipelineError::EmptySnapshot);
    }
    Ok(build)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_selects_sources_in_priority_order() {
        let mut settings = SourceSettings::default();
        let names = |s: &SourceSettings| {
            build_sources(s)
                .unwrap()
                .iter()
                .map(|c| c.name().to_string())
                .collect::<Vec<_>>()
        };

        assert_eq!(names(&settings), ["wikidata", "dbpedia"]);
        settings.mode = SourceMode::Dbpedia;
        assert_eq!(names(&settings), ["dbpedia"]);
        settings.mode = SourceMode::Wikidata;
        assert_eq!(names(&settings), ["wikidata"]);
    }
}
