//! PubMed E-utilities client.
//!
//! Endpoints used:
//!   esearch — query → PMIDs, paginated via retstart/retmax
//!   efetch (db=pubmed) — PMIDs → title/abstract metadata XML, batched
//!   efetch (db=pmc) — PMCID → open-access full-text XML
//!
//! Every outbound call goes through the rate limiter; the API key and
//! contact email are decorated onto the query parameters when present.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use claimscope_common::{ClaimscopeError, NcbiCredentials, Result, SandboxClient};
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, instrument, warn};

use super::LiteratureSource;
use crate::models::{EvidenceRecord, FailedFetch, SearchResult, SummaryBatch};
use crate::pacing::{Clock, RateLimiter, SystemClock};
use crate::tuning::RetrievalTuning;

const ESEARCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi";
const EFETCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi";
const TOOL_NAME: &str = "claimscope";

/// One E-utilities HTTP round trip. Non-2xx statuses come back as values so
/// the client can map them per endpoint.
#[derive(Debug, Clone)]
pub struct EutilsResponse {
    pub status: u16,
    pub body: String,
}

/// Transport seam: the client's pagination, batching, and pacing logic is
/// exercised in tests against canned responses.
#[async_trait]
pub trait EutilsTransport: Send + Sync {
    async fn get(&self, url: &str, params: &[(String, String)]) -> Result<EutilsResponse>;
}

pub struct HttpTransport {
    client: SandboxClient,
}

impl HttpTransport {
    pub fn new(client: SandboxClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EutilsTransport for HttpTransport {
    async fn get(&self, url: &str, params: &[(String, String)]) -> Result<EutilsResponse> {
        let response = self
            .client
            .get(url)?
            .query(params)
            .send()
            .await
            .map_err(|e| ClaimscopeError::TransientSearch(format!("transport: {e}")))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ClaimscopeError::TransientSearch(format!("transport: {e}")))?;
        Ok(EutilsResponse { status, body })
    }
}

pub struct PubMedClient {
    transport: Arc<dyn EutilsTransport>,
    clock: Arc<dyn Clock>,
    credentials: NcbiCredentials,
    limiter: RateLimiter,
    tuning: RetrievalTuning,
}

impl PubMedClient {
    pub fn new(credentials: NcbiCredentials, tuning: RetrievalTuning) -> Result<Self> {
        let sandbox = SandboxClient::new(tuning.http_timeout())?;
        Ok(Self::with_parts(
            credentials,
            tuning,
            Arc::new(HttpTransport::new(sandbox)),
            Arc::new(SystemClock),
        ))
    }

    /// Construct with explicit transport and clock. This is the seam the
    /// pacing and pagination tests use.
    pub fn with_parts(
        credentials: NcbiCredentials,
        tuning: RetrievalTuning,
        transport: Arc<dyn EutilsTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let limiter = RateLimiter::new(credentials.min_request_interval());
        Self {
            transport,
            clock,
            credentials,
            limiter,
            tuning,
        }
    }

    /// Minimum spacing this client enforces between outbound requests.
    pub fn min_request_interval(&self) -> std::time::Duration {
        self.limiter.min_interval()
    }

    fn base_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("tool".to_string(), TOOL_NAME.to_string())];
        if let Some(key) = &self.credentials.api_key {
            params.push(("api_key".to_string(), key.clone()));
        }
        if let Some(email) = &self.credentials.email {
            params.push(("email".to_string(), email.clone()));
        }
        params
    }

    /// Single funnel for outbound requests; pacing happens here.
    async fn request(&self, url: &str, params: &[(String, String)]) -> Result<EutilsResponse> {
        self.limiter.pace(self.clock.as_ref()).await;
        self.transport.get(url, params).await
    }

    async fn esearch_page(&self, query: &str, retstart: usize, retmax: usize) -> Result<(Vec<String>, u64)> {
        let mut params = self.base_params();
        params.push(("db".to_string(), "pubmed".to_string()));
        params.push(("term".to_string(), query.to_string()));
        params.push(("retmode".to_string(), "json".to_string()));
        params.push(("retstart".to_string(), retstart.to_string()));
        params.push(("retmax".to_string(), retmax.to_string()));
        params.push(("usehistory".to_string(), "n".to_string()));

        let resp = self.request(ESEARCH_URL, &params).await?;
        match resp.status {
            200..=299 => {}
            400..=499 => {
                return Err(ClaimscopeError::InvalidQuery(format!(
                    "esearch rejected the query (status {})",
                    resp.status
                )))
            }
            status => {
                return Err(ClaimscopeError::TransientSearch(format!(
                    "esearch failed with status {status}"
                )))
            }
        }

        let json: serde_json::Value = serde_json::from_str(&resp.body)?;
        parse_esearch_response(&json)
    }

    async fn efetch_batch(&self, pmids: &[String]) -> Result<Vec<EvidenceRecord>> {
        let mut params = self.base_params();
        params.push(("db".to_string(), "pubmed".to_string()));
        params.push(("id".to_string(), pmids.join(",")));
        params.push(("rettype".to_string(), "abstract".to_string()));
        params.push(("retmode".to_string(), "xml".to_string()));

        let resp = self.request(EFETCH_URL, &params).await?;
        if !(200..=299).contains(&resp.status) {
            return Err(ClaimscopeError::TransientSearch(format!(
                "efetch failed with status {}",
                resp.status
            )));
        }

        parse_pubmed_xml(&resp.body)
    }
}

#[async_trait]
impl LiteratureSource for PubMedClient {
    /// Paginated search: requests `max_results` ids in as few calls as the
    /// page ceiling allows, aggregating pages in relevance order.
    #[instrument(skip(self))]
    async fn search(&self, query: &str, max_results: usize) -> Result<SearchResult> {
        let mut pmids: Vec<String> = Vec::new();
        let mut total_count = 0u64;

        while pmids.len() < max_results {
            let page = (max_results - pmids.len()).min(self.tuning.esearch_page_size);
            let (ids, count) = self.esearch_page(query, pmids.len(), page).await?;
            total_count = count;
            if ids.is_empty() {
                break;
            }
            pmids.extend(ids);
            if pmids.len() as u64 >= total_count {
                break;
            }
        }

        debug!(returned = pmids.len(), total_count, "esearch aggregated PMIDs");
        Ok(SearchResult { pmids, total_count })
    }

    /// Batched summary fetch. A failed batch contributes its ids to the
    /// `failed` side channel; batches already fetched are kept.
    #[instrument(skip(self, pmids), fields(requested = pmids.len()))]
    async fn fetch_summaries(&self, pmids: &[String]) -> Result<SummaryBatch> {
        let mut batch = SummaryBatch::default();

        for chunk in pmids.chunks(self.tuning.efetch_batch_size.max(1)) {
            match self.efetch_batch(chunk).await {
                Ok(records) => {
                    for record in records {
                        batch.summaries.insert(record.pmid.clone(), record);
                    }
                    // Ids the response simply did not contain are failures
                    // too — a deleted or embargoed PMID returns nothing.
                    for pmid in chunk {
                        if !batch.summaries.contains_key(pmid) {
                            batch.failed.push(FailedFetch {
                                pmid: pmid.clone(),
                                reason: "no article in efetch response".to_string(),
                            });
                        }
                    }
                }
                Err(err) => {
                    warn!(error = %err, batch_len = chunk.len(), "efetch batch failed");
                    for pmid in chunk {
                        batch.failed.push(FailedFetch {
                            pmid: pmid.clone(),
                            reason: err.to_string(),
                        });
                    }
                }
            }
        }

        Ok(batch)
    }

    /// PMC full text. Documents outside the open-access subset return
    /// `Ok(None)`; only transport-level failures are errors.
    #[instrument(skip(self))]
    async fn fetch_full_text(&self, pmcid: &str) -> Result<Option<String>> {
        let mut params = self.base_params();
        params.push(("db".to_string(), "pmc".to_string()));
        params.push((
            "id".to_string(),
            pmcid.trim_start_matches("PMC").to_string(),
        ));
        params.push(("retmode".to_string(), "xml".to_string()));

        let resp = self.request(EFETCH_URL, &params).await?;
        if !(200..=299).contains(&resp.status) {
            return Err(ClaimscopeError::TransientSearch(format!(
                "PMC efetch failed with status {}",
                resp.status
            )));
        }
        if resp.body.trim().is_empty() || resp.body.contains("<error>") {
            return Ok(None);
        }

        Ok(extract_pmc_text(&resp.body, self.tuning.max_full_text_chars))
    }
}

/// Pull the id list and total count out of an esearch JSON response.
fn parse_esearch_response(json: &serde_json::Value) -> Result<(Vec<String>, u64)> {
    let result = json
        .get("esearchresult")
        .ok_or_else(|| ClaimscopeError::TransientSearch("esearch response missing esearchresult".to_string()))?;

    let ids: Vec<String> = result["idlist"]
        .as_array()
        .unwrap_or(&vec![])
        .iter()
        .filter_map(|v| v.as_str().map(String::from))
        .collect();

    let count = result["count"]
        .as_str()
        .and_then(|c| c.parse::<u64>().ok())
        .unwrap_or(ids.len() as u64);

    Ok((ids, count))
}

/// Parse PubMed XML (efetch abstract mode) into evidence records.
/// Handles the `<PubmedArticleSet><PubmedArticle>` structure.
fn parse_pubmed_xml(xml: &str) -> Result<Vec<EvidenceRecord>> {
    let mut records = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut current: Option<EvidenceRecord> = None;
    let mut abstract_parts: Vec<String> = Vec::new();
    let mut pub_year = String::new();
    let mut pub_month = String::new();
    let mut pub_day = String::new();
    let mut current_last = String::new();
    let mut current_fore = String::new();
    let mut article_id_type: Option<String> = None;

    let mut in_pmid = false;
    let mut in_title = false;
    let mut in_abstract = false;
    let mut in_author = false;
    let mut in_last_name = false;
    let mut in_fore_name = false;
    let mut in_journal = false;
    let mut in_journal_title = false;
    let mut in_pub_date = false;
    let mut in_year = false;
    let mut in_month = false;
    let mut in_day = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"PubmedArticle" => {
                    current = Some(EvidenceRecord::new(""));
                    abstract_parts.clear();
                    pub_year.clear();
                    pub_month.clear();
                    pub_day.clear();
                }
                b"PMID" => in_pmid = true,
                b"ArticleTitle" => in_title = true,
                b"AbstractText" => in_abstract = true,
                b"Author" => {
                    in_author = true;
                    current_last.clear();
                    current_fore.clear();
                }
                b"LastName" => in_last_name = true,
                b"ForeName" => in_fore_name = true,
                b"Journal" => in_journal = true,
                b"Title" if in_journal => in_journal_title = true,
                b"PubDate" => in_pub_date = true,
                b"Year" if in_pub_date => in_year = true,
                b"Month" if in_pub_date => in_month = true,
                b"Day" if in_pub_date => in_day = true,
                b"ArticleId" => {
                    article_id_type = e
                        .try_get_attribute("IdType")
                        .ok()
                        .flatten()
                        .and_then(|attr| attr.unescape_value().ok().map(|v| v.to_string()));
                }
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default().to_string();
                if let Some(ref mut record) = current {
                    if in_pmid && record.pmid.is_empty() {
                        record.pmid = text.clone();
                    }
                    if in_title {
                        record.title = text.clone();
                    }
                    if in_abstract {
                        abstract_parts.push(text.clone());
                    }
                    if in_last_name {
                        current_last = text.clone();
                    }
                    if in_fore_name {
                        current_fore = text.clone();
                    }
                    if in_journal_title && record.journal.is_none() {
                        record.journal = Some(text.clone());
                    }
                    if in_year {
                        pub_year = text.clone();
                    }
                    if in_month {
                        pub_month = text.clone();
                    }
                    if in_day {
                        pub_day = text.clone();
                    }
                    match article_id_type.as_deref() {
                        Some("doi") if record.doi.is_none() => record.doi = Some(text.clone()),
                        Some("pmc") if record.pmcid.is_none() => record.pmcid = Some(text.clone()),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"PMID" => in_pmid = false,
                b"ArticleTitle" => in_title = false,
                b"AbstractText" => in_abstract = false,
                b"LastName" => in_last_name = false,
                b"ForeName" => in_fore_name = false,
                b"Journal" => in_journal = false,
                b"Title" => in_journal_title = false,
                b"PubDate" => in_pub_date = false,
                b"Year" => in_year = false,
                b"Month" => in_month = false,
                b"Day" => in_day = false,
                b"ArticleId" => article_id_type = None,
                b"Author" => {
                    if in_author {
                        if let Some(ref mut record) = current {
                            let name = if current_fore.is_empty() {
                                current_last.clone()
                            } else {
                                format!("{} {}", current_fore, current_last)
                            };
                            if !name.is_empty() {
                                record.authors.push(name);
                            }
                        }
                        in_author = false;
                    }
                }
                b"PubmedArticle" => {
                    if let Some(mut record) = current.take() {
                        if !abstract_parts.is_empty() {
                            record.abstract_text = Some(abstract_parts.join(" "));
                        }
                        record.pub_date = parse_pub_date(&pub_year, &pub_month, &pub_day);
                        if record.pmid.is_empty() {
                            warn!("skipping article with no PMID");
                        } else {
                            records.push(record);
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ClaimscopeError::Xml(format!("efetch response: {e}")));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(records)
}

/// PubDate fields come as "2024" / "Mar" / "5"; month may be a name or a
/// number, and month/day are frequently absent.
fn parse_pub_date(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    let year: i32 = year.parse().ok()?;
    let month = match month {
        "" => 1,
        m => m.parse::<u32>().ok().or_else(|| month_name(m))?,
    };
    let day: u32 = if day.is_empty() { 1 } else { day.parse().ok()? };
    NaiveDate::from_ymd_opt(year, month, day)
}

fn month_name(month: &str) -> Option<u32> {
    // Char-based prefix: remote data occasionally carries non-ASCII month
    // names, which must degrade to "no date", not slice mid-character.
    let prefix: String = month.chars().take(3).collect();
    match prefix.as_str() {
        "Jan" => Some(1),
        "Feb" => Some(2),
        "Mar" => Some(3),
        "Apr" => Some(4),
        "May" => Some(5),
        "Jun" => Some(6),
        "Jul" => Some(7),
        "Aug" => Some(8),
        "Sep" => Some(9),
        "Oct" => Some(10),
        "Nov" => Some(11),
        "Dec" => Some(12),
        _ => None,
    }
}

/// Extract readable text from a PMC full-text XML document: the contents of
/// `<abstract>` and `<body>`, whitespace-collapsed and capped.
fn extract_pmc_text(xml: &str, max_chars: usize) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut pieces: Vec<String> = Vec::new();
    let mut depth_abstract = 0usize;
    let mut depth_body = 0usize;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"abstract" => depth_abstract += 1,
                b"body" => depth_body += 1,
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"abstract" => depth_abstract = depth_abstract.saturating_sub(1),
                b"body" => depth_body = depth_body.saturating_sub(1),
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                if depth_abstract > 0 || depth_body > 0 {
                    let text = e.unescape().unwrap_or_default().to_string();
                    if !text.trim().is_empty() {
                        pieces.push(text);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    if pieces.is_empty() {
        return None;
    }

    let joined = pieces.join(" ");
    let collapsed: String = joined.split_whitespace().collect::<Vec<_>>().join(" ");
    Some(truncate_chars(&collapsed, max_chars).to_string())
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_ARTICLE_XML: &str = r#"<?xml version="1.0"?>
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation>
      <PMID>12345678</PMID>
      <Article>
        <Journal>
          <Title>The Lancet</Title>
          <JournalIssue>
            <PubDate><Year>2023</Year><Month>Mar</Month><Day>5</Day></PubDate>
          </JournalIssue>
        </Journal>
        <ArticleTitle>Aspirin and cardiovascular outcomes</ArticleTitle>
        <Abstract>
          <AbstractText>Background section.</AbstractText>
          <AbstractText>Conclusion section.</AbstractText>
        </Abstract>
        <AuthorList>
          <Author><LastName>Smith</LastName><ForeName>Jane</ForeName></Author>
          <Author><LastName>Okafor</LastName></Author>
        </AuthorList>
      </Article>
    </MedlineCitation>
    <PubmedData>
      <ArticleIdList>
        <ArticleId IdType="doi">10.1016/test.2023</ArticleId>
        <ArticleId IdType="pmc">PMC7654321</ArticleId>
      </ArticleIdList>
    </PubmedData>
  </PubmedArticle>
</PubmedArticleSet>"#;

    #[test]
    fn parses_full_article_metadata() {
        let records = parse_pubmed_xml(SAMPLE_ARTICLE_XML).unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.pmid, "12345678");
        assert_eq!(record.title, "Aspirin and cardiovascular outcomes");
        assert_eq!(
            record.abstract_text.as_deref(),
            Some("Background section. Conclusion section.")
        );
        assert_eq!(record.authors, vec!["Jane Smith", "Okafor"]);
        assert_eq!(record.journal.as_deref(), Some("The Lancet"));
        assert_eq!(record.pub_date, NaiveDate::from_ymd_opt(2023, 3, 5));
        assert_eq!(record.doi.as_deref(), Some("10.1016/test.2023"));
        assert_eq!(record.pmcid.as_deref(), Some("PMC7654321"));
        assert_eq!(record.source_url(), "https://doi.org/10.1016/test.2023");
    }

    #[test]
    fn article_without_abstract_still_parses() {
        let xml = r#"<PubmedArticleSet><PubmedArticle><MedlineCitation>
            <PMID>42</PMID>
            <Article><ArticleTitle>Title only</ArticleTitle></Article>
        </MedlineCitation></PubmedArticle></PubmedArticleSet>"#;
        let records = parse_pubmed_xml(xml).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].pmid, "42");
        assert!(records[0].abstract_text.is_none());
        assert!(records[0].is_usable());
    }

    #[test]
    fn esearch_response_parses_ids_and_count() {
        let json = serde_json::json!({
            "esearchresult": {
                "count": "2841",
                "idlist": ["111", "222", "333"]
            }
        });
        let (ids, count) = parse_esearch_response(&json).unwrap();
        assert_eq!(ids, vec!["111", "222", "333"]);
        assert_eq!(count, 2841);
    }

    #[test]
    fn esearch_response_without_result_is_transient() {
        let json = serde_json::json!({ "unexpected": {} });
        let err = parse_esearch_response(&json).expect_err("should fail");
        assert!(err.is_retryable());
    }

    #[test]
    fn pmc_text_extraction_joins_abstract_and_body() {
        let xml = r#"<article>
            <front><article-meta>
                <abstract><p>Short   summary.</p></abstract>
            </article-meta></front>
            <body><sec><title>Methods</title><p>We did things.</p></sec></body>
            <back><ref-list><ref>Ignored citation</ref></ref-list></back>
        </article>"#;
        let text = extract_pmc_text(xml, 10_000).unwrap();
        assert_eq!(text, "Short summary. Methods We did things.");
    }

    #[test]
    fn pmc_text_is_capped() {
        let xml = "<article><body><p>abcdefghij</p></body></article>";
        let text = extract_pmc_text(xml, 4).unwrap();
        assert_eq!(text, "abcd");
    }

    #[test]
    fn pub_date_handles_named_months_and_missing_parts() {
        assert_eq!(
            parse_pub_date("2020", "Jan", "15"),
            NaiveDate::from_ymd_opt(2020, 1, 15)
        );
        assert_eq!(
            parse_pub_date("2020", "", ""),
            NaiveDate::from_ymd_opt(2020, 1, 1)
        );
        assert_eq!(
            parse_pub_date("2020", "07", ""),
            NaiveDate::from_ymd_opt(2020, 7, 1)
        );
        assert_eq!(parse_pub_date("", "Jan", "1"), None);
    }

    #[test]
    fn non_ascii_month_degrades_to_no_date() {
        assert_eq!(parse_pub_date("2021", "дек", "3"), None);

        let xml = r#"<PubmedArticleSet><PubmedArticle><MedlineCitation>
            <PMID>77</PMID>
            <Article>
              <Journal><JournalIssue>
                <PubDate><Year>2021</Year><Month>дек</Month></PubDate>
              </JournalIssue></Journal>
              <ArticleTitle>Localized metadata</ArticleTitle>
            </Article>
        </MedlineCitation></PubmedArticle></PubmedArticleSet>"#;
        let records = parse_pubmed_xml(xml).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].pmid, "77");
        assert!(records[0].pub_date.is_none());
    }
}
