//! TMDb search enricher.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{AdapterError, EnrichmentMatch, EnrichmentQuery, Enricher, MediaKind, RetryPolicy};

pub const TMDB_API_BASE: &str = "https://api.themoviedb.org/3";

pub struct TmdbEnricher {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
pub struct TmdbSearchResponse {
    #[serde(default)]
    pub results: Vec<TmdbSearchResult>,
}

#[derive(Debug, Deserialize)]
pub struct TmdbSearchResult {
    pub title: Option<String>,
    pub name: Option<String>, // TV shows use "name" instead of "title"
    pub release_date: Option<String>,
    pub first_air_date: Option<String>, // TV shows
}

impl TmdbEnricher {
    pub fn new(api_key: impl Into<String>, request_timeout: Duration) -> Result<Self, AdapterError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: TMDB_API_BASE.to_string(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn search_url(&self, kind: MediaKind) -> String {
        let segment = match kind {
            MediaKind::Movie => "movie",
            MediaKind::Tv => "tv",
        };
        format!("{}/search/{}", self.base_url, segment)
    }
}

/// Query parameters for a search; the year is only sent when it is numeric
pub fn search_params<'a>(api_key: &'a str, query: &'a EnrichmentQuery) -> Vec<(&'static str, &'a str)> {
    let mut params = vec![("api_key", api_key), ("query", query.title.as_str())];
    if let Some(year) = query
        .year
        .as_deref()
        .filter(|y| !y.is_empty() && y.bytes().all(|b| b.is_ascii_digit()))
    {
        params.push(("year", year));
    }
    params
}

/// Take the first result, reading the field names that match `kind`
pub fn best_match(response: TmdbSearchResponse, kind: MediaKind) -> Option<EnrichmentMatch> {
    let first = response.results.into_iter().next()?;
    let (title, release_date) = match kind {
        MediaKind::Movie => (first.title, first.release_date),
        MediaKind::Tv => (first.name, first.first_air_date),
    };

    Some(EnrichmentMatch {
        title: title.filter(|t| !t.trim().is_empty())?,
        release_date,
    })
}

#[async_trait]
impl Enricher for TmdbEnricher {
    fn name(&self) -> &str {
        "tmdb"
    }

    async fn lookup(
        &self,
        query: &EnrichmentQuery,
    ) -> Result<Option<EnrichmentMatch>, AdapterError> {
        let url = self.search_url(query.kind);
        let params = search_params(&self.api_key, query);
        let (url, params) = (&url, &params);

        let response: TmdbSearchResponse = self
            .retry
            .run("tmdb_search", move || async move {
                let response = self.client.get(url).query(params).send().await?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(AdapterError::Status {
                        status: status.as_u16(),
                        body,
                    });
                }

                Ok(response.json::<TmdbSearchResponse>().await?)
            })
            .await?;

        debug!(title = %query.title, results = response.results.len(), "TMDb search");
        Ok(best_match(response, query.kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> TmdbSearchResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_best_match_movie() {
        let response = parse(
            r#"{"results": [
                {"title": "Test Movie", "release_date": "2020-01-01"},
                {"title": "Other", "release_date": "1999-01-01"}
            ], "total_results": 2}"#,
        );

        let m = best_match(response, MediaKind::Movie).unwrap();
        assert_eq!(m.title, "Test Movie");
        assert_eq!(m.year(), Some("2020"));
    }

    #[test]
    fn test_best_match_tv_uses_name_fields() {
        let response = parse(
            r#"{"results": [{"name": "Test Show", "first_air_date": "2008-01-20"}]}"#,
        );

        let m = best_match(response, MediaKind::Tv).unwrap();
        assert_eq!(m.title, "Test Show");
        assert_eq!(m.release_date.as_deref(), Some("2008-01-20"));
    }

    #[test]
    fn test_no_results() {
        assert!(best_match(parse(r#"{"results": []}"#), MediaKind::Movie).is_none());
        assert!(best_match(parse("{}"), MediaKind::Movie).is_none());
        assert!(best_match(parse(r#"{"results": [{"name": "x"}]}"#), MediaKind::Movie).is_none());
    }

    #[test]
    fn test_year_only_sent_when_numeric() {
        let query = EnrichmentQuery {
            title: "Test Movie".to_string(),
            year: Some("2020".to_string()),
            kind: MediaKind::Movie,
        };
        let params = search_params("k", &query);
        assert!(params.contains(&("year", "2020")));

        let query = EnrichmentQuery {
            year: Some("unknown".to_string()),
            ..query
        };
        let params = search_params("k", &query);
        assert!(params.iter().all(|(key, _)| *key != "year"));
    }

    #[test]
    fn test_search_url() {
        let enricher = TmdbEnricher::new("k", Duration::from_secs(5))
            .unwrap()
            .with_base_url("http://localhost:1/3/");
        assert_eq!(enricher.search_url(MediaKind::Tv), "http://localhost:1/3/search/tv");
        assert_eq!(enricher.search_url(MediaKind::Movie), "http://localhost:1/3/search/movie");
    }
}
