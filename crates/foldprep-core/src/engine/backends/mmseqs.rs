//! Remote batch search against an MMseqs2-style web service.
//!
//! All chains of a job are submitted as one ticket; the service is polled
//! until the search completes and the combined A3M result is downloaded.
//! The wire protocol lives behind [`RemoteSearchClient`] so tests and other
//! deployments can substitute their own transport.

use super::AlignmentBackend;
use crate::core::io::a3m::parse_a3m;
use crate::core::models::alignment::{AlignmentSet, AlignmentTrack};
use crate::engine::cache::{MsaBundle, MsaCache};
use crate::engine::config::NetworkConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::retry::with_retries;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Transport seam for the remote search service: submit a batch of chains,
/// get back one A3M document per chain, in submission order.
pub trait RemoteSearchClient {
    fn batch_search(
        &self,
        chains: &[String],
        reporter: &ProgressReporter,
    ) -> Result<Vec<String>, EngineError>;
}

#[derive(Debug, Deserialize)]
struct Ticket {
    id: String,
    status: String,
}

/// HTTP client for the public MMseqs2 API.
#[derive(Debug, Clone)]
pub struct MmseqsClient {
    host: String,
    /// Include the environmental databases in the search.
    use_env: bool,
    network: NetworkConfig,
}

impl MmseqsClient {
    pub fn new(host: String, use_env: bool, network: NetworkConfig) -> Self {
        Self {
            host,
            use_env,
            network,
        }
    }

    pub fn public(use_env: bool, network: NetworkConfig) -> Self {
        Self::new("https://a3m.mmseqs.com".to_string(), use_env, network)
    }

    fn query_fasta(chains: &[String]) -> String {
        let mut fasta = String::new();
        for (i, chain) in chains.iter().enumerate() {
            fasta.push_str(&format!(">{}\n{}\n", 101 + i, chain));
        }
        fasta
    }
}

impl RemoteSearchClient for MmseqsClient {
    #[instrument(skip_all, fields(chains = chains.len()))]
    fn batch_search(
        &self,
        chains: &[String],
        reporter: &ProgressReporter,
    ) -> Result<Vec<String>, EngineError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.network.request_timeout())
            .build()?;
        let mode = if self.use_env { "env" } else { "all" };
        let fasta = Self::query_fasta(chains);

        let ticket: Ticket = with_retries(&self.network.retry, "search submission", || {
            Ok(client
                .post(format!("{}/ticket/msa", self.host))
                .form(&[("q", fasta.as_str()), ("mode", mode)])
                .send()?
                .error_for_status()?
                .json()?)
        })?;
        info!(ticket = %ticket.id, mode, "Submitted remote search");
        reporter.report(Progress::Message(format!(
            "Remote search submitted ({mode} mode)"
        )));

        let deadline = Instant::now() + self.network.request_timeout();
        let mut status = ticket.status;
        while status == "PENDING" || status == "RUNNING" || status == "UNKNOWN" {
            if Instant::now() > deadline {
                return Err(EngineError::Tool {
                    tool: "mmseqs2 api",
                    message: format!("search did not complete before the deadline ({status})"),
                });
            }
            std::thread::sleep(POLL_INTERVAL);
            let polled: Ticket = with_retries(&self.network.retry, "status poll", || {
                Ok(client
                    .get(format!("{}/ticket/{}", self.host, ticket.id))
                    .send()?
                    .error_for_status()?
                    .json()?)
            })?;
            debug!(status = %polled.status, "Polled remote search");
            status = polled.status;
        }
        if status != "COMPLETE" {
            return Err(EngineError::Tool {
                tool: "mmseqs2 api",
                message: format!("search ended with status {status}"),
            });
        }
        reporter.report(Progress::Message("Remote search complete".to_string()));

        let body = with_retries(&self.network.retry, "result download", || {
            Ok(client
                .get(format!("{}/result/download/{}", self.host, ticket.id))
                .send()?
                .error_for_status()?
                .text()?)
        })?;
        split_batch_a3m(&body, chains.len())
    }
}

/// The combined result interleaves per-query A3M documents separated by NUL
/// bytes. A single-query result may omit the separator entirely.
fn split_batch_a3m(body: &str, expected: usize) -> Result<Vec<String>, EngineError> {
    let documents: Vec<String> = body
        .split('\u{0}')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .collect();
    if documents.len() != expected {
        return Err(EngineError::Tool {
            tool: "mmseqs2 api",
            message: format!(
                "result holds {} alignment documents for {} queries",
                documents.len(),
                expected
            ),
        });
    }
    Ok(documents)
}

/// Cache-aware wrapper that turns batch A3M results into per-chain sets.
pub struct MmseqsBackend<C: RemoteSearchClient = MmseqsClient> {
    client: C,
    cache: MsaCache,
}

impl<C: RemoteSearchClient> MmseqsBackend<C> {
    pub fn new(client: C, cache: MsaCache) -> Self {
        Self { client, cache }
    }
}

impl<C: RemoteSearchClient> AlignmentBackend for MmseqsBackend<C> {
    fn fetch(
        &self,
        chains: &[String],
        reporter: &ProgressReporter,
    ) -> Result<Vec<AlignmentSet>, EngineError> {
        let mut sets: Vec<Option<AlignmentSet>> = chains
            .iter()
            .map(|chain| self.cache.load(chain).map(MsaBundle::into_set))
            .collect();

        let missing: Vec<(usize, String)> = chains
            .iter()
            .enumerate()
            .filter(|(i, _)| sets[*i].is_none())
            .map(|(i, c)| (i, c.clone()))
            .collect();
        if !missing.is_empty() {
            let queries: Vec<String> = missing.iter().map(|(_, c)| c.clone()).collect();
            let documents = self.client.batch_search(&queries, reporter)?;
            for ((index, chain), document) in missing.into_iter().zip(documents) {
                let track = AlignmentTrack::from(parse_a3m(&document)?);
                let set = AlignmentSet::new(vec![track]);
                self.cache.store(&chain, &MsaBundle::from_set(&set))?;
                sets[index] = Some(set);
            }
        }

        // Every slot is filled: cached upfront or searched just above.
        sets.into_iter()
            .map(|s| s.ok_or_else(|| EngineError::Internal("unfilled alignment slot".into())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CannedClient {
        documents: Vec<String>,
    }

    impl RemoteSearchClient for CannedClient {
        fn batch_search(
            &self,
            chains: &[String],
            _reporter: &ProgressReporter,
        ) -> Result<Vec<String>, EngineError> {
            assert_eq!(chains.len(), self.documents.len());
            Ok(self.documents.clone())
        }
    }

    #[test]
    fn batch_results_map_back_to_chains_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MsaCache::new(dir.path()).unwrap();
        let backend = MmseqsBackend::new(
            CannedClient {
                documents: vec![
                    ">101\nMKVL\n>hit\nMRVL\n".to_string(),
                    ">102\nGG\n".to_string(),
                ],
            },
            cache,
        );
        let sets = backend
            .fetch(
                &["MKVL".to_string(), "GG".to_string()],
                &ProgressReporter::new(),
            )
            .unwrap();
        assert_eq!(sets[0].tracks[0].rows, vec!["MKVL", "MRVL"]);
        assert_eq!(sets[1].tracks[0].rows, vec!["GG"]);
    }

    #[test]
    fn cached_chains_are_not_resubmitted() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MsaCache::new(dir.path()).unwrap();
        let seeded = AlignmentSet::new(vec![AlignmentTrack::query_only("MKVL")]);
        cache.store("MKVL", &MsaBundle::from_set(&seeded)).unwrap();

        let backend = MmseqsBackend::new(
            CannedClient {
                documents: vec![">101\nGG\n".to_string()],
            },
            cache,
        );
        let sets = backend
            .fetch(
                &["MKVL".to_string(), "GG".to_string()],
                &ProgressReporter::new(),
            )
            .unwrap();
        assert_eq!(sets[0], seeded);
        assert_eq!(sets[1].tracks[0].rows, vec!["GG"]);
    }

    #[test]
    fn hollow_cached_bundles_trigger_a_fresh_search() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MsaCache::new(dir.path()).unwrap();
        let hollow = MsaBundle {
            msas: vec![],
            deletion_matrices: vec![],
            names: vec![],
        };
        std::fs::write(
            cache.path_for("MKVL"),
            serde_json::to_vec(&hollow).unwrap(),
        )
        .unwrap();

        let backend = MmseqsBackend::new(
            CannedClient {
                documents: vec![">101\nMKVL\n>hit\nMRVL\n".to_string()],
            },
            cache,
        );
        let sets = backend
            .fetch(&["MKVL".to_string()], &ProgressReporter::new())
            .unwrap();
        assert_eq!(sets[0].tracks[0].rows, vec!["MKVL", "MRVL"]);
    }

    #[test]
    fn nul_separated_batches_split_per_query() {
        let body = ">101\nMKVL\n\u{0}>102\nGG\n";
        let documents = split_batch_a3m(body, 2).unwrap();
        assert!(documents[0].starts_with(">101"));
        assert!(documents[1].starts_with(">102"));
        assert!(split_batch_a3m(body, 3).is_err());
    }
}
