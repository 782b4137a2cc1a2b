//! `NoteStore` backed by Supabase's PostgREST API.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use tokio::sync::watch;

use crate::auth::{parse_api_error, AuthUser};
use crate::config::ClientConfig;
use crate::models::{Note, NoteId, NotePatch, NotesFilter};
use crate::session::SessionState;
use crate::{Error, Result};

use super::NoteStore;

const NOTES_TABLE: &str = "notes";

/// PostgREST client that authenticates as the currently published session.
#[derive(Clone)]
pub struct SupabaseNoteStore {
    notes_url: String,
    anon_key: String,
    client: Client,
    session: watch::Receiver<SessionState>,
}

impl SupabaseNoteStore {
    pub fn new(config: &ClientConfig, session: watch::Receiver<SessionState>) -> Result<Self> {
        Ok(Self {
            notes_url: format!("{}/{NOTES_TABLE}", config.rest_url()),
            anon_key: config.supabase_anon_key.clone(),
            client: Client::builder().build()?,
            session,
        })
    }

    fn access_token(&self) -> Result<String> {
        self.session
            .borrow()
            .session
            .as_ref()
            .map(|session| session.access_token.clone())
            .ok_or(Error::Unauthenticated)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.access_token()?;
        Ok(request
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .header("Accept", "application/json"))
    }

    async fn expect_rows(response: Response) -> Result<Vec<Note>> {
        let response = check_status(response).await?;
        Ok(response.json::<Vec<Note>>().await?)
    }

    async fn expect_single(response: Response, id: Option<&NoteId>) -> Result<Note> {
        Self::expect_rows(response).await?.into_iter().next().ok_or_else(|| {
            Error::NotFound(id.map_or_else(|| "inserted row".to_string(), NoteId::to_string))
        })
    }
}

#[async_trait]
impl NoteStore for SupabaseNoteStore {
    async fn list_notes(
        &self,
        filter: &NotesFilter,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<Note>> {
        tracing::debug!(page, ?filter, "Fetching notes page");
        let request = self.authorized(
            self.client
                .get(&self.notes_url)
                .query(&list_query_params(filter, page, page_size)),
        )?;
        Self::expect_rows(request.send().await?).await
    }

    async fn current_identity(&self) -> Result<AuthUser> {
        self.session
            .borrow()
            .session
            .as_ref()
            .map(|session| session.user.clone())
            .ok_or(Error::Unauthenticated)
    }

    async fn insert_note(&self, owner: &AuthUser) -> Result<Note> {
        let body = serde_json::json!({
            "title": "",
            "content": "",
            "starred": false,
            "user_id": owner.id,
        });
        let request = self.authorized(
            self.client
                .post(&self.notes_url)
                .header("Prefer", "return=representation")
                .json(&body),
        )?;
        Self::expect_single(request.send().await?, None).await
    }

    async fn update_note(&self, id: &NoteId, patch: &NotePatch) -> Result<Note> {
        if patch.is_empty() {
            return Err(Error::InvalidInput("update must change at least one field".into()));
        }
        let request = self.authorized(
            self.client
                .patch(&self.notes_url)
                .query(&[("id", format!("eq.{id}"))])
                .header("Prefer", "return=representation")
                .json(&update_body(patch)?),
        )?;
        Self::expect_single(request.send().await?, Some(id)).await
    }

    async fn delete_note(&self, id: &NoteId) -> Result<()> {
        let request = self.authorized(
            self.client
                .delete(&self.notes_url)
                .query(&[("id", format!("eq.{id}"))]),
        )?;
        check_status(request.send().await?).await?;
        Ok(())
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::Api {
        status: status.as_u16(),
        message: parse_api_error(status, &body),
    })
}

/// PostgREST query parameters for one page of the note list.
fn list_query_params(filter: &NotesFilter, page: usize, page_size: usize) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("select", "*".to_string()),
        ("order", "updated_at.desc".to_string()),
        ("offset", (page * page_size).to_string()),
        ("limit", page_size.to_string()),
    ];
    if let Some(term) = filter.search_term() {
        let pattern = ilike_pattern(term);
        params.push((
            "or",
            format!("(title.ilike.{pattern},content.ilike.{pattern})"),
        ));
    }
    if filter.starred_only {
        params.push(("starred", "eq.true".to_string()));
    }
    params
}

/// Quoted `ilike` operand matching `term` anywhere in the column.
///
/// PostgREST reserves `,` `(` `)` inside logic trees, so the operand is
/// double-quoted; `*` is the URL-safe wildcard.
fn ilike_pattern(term: &str) -> String {
    let escaped = term.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"*{escaped}*\"")
}

/// Update body: the patch plus a fresh `updated_at` stamp.
fn update_body(patch: &NotePatch) -> Result<serde_json::Value> {
    let mut body = serde_json::to_value(patch)?;
    if let Some(fields) = body.as_object_mut() {
        fields.insert(
            "updated_at".to_string(),
            serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
        );
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::auth::test_session;

    fn param<'a>(params: &'a [(&'static str, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| value.as_str())
    }

    #[test]
    fn list_params_page_through_offset() {
        let params = list_query_params(&NotesFilter::default(), 2, 20);
        assert_eq!(param(&params, "order"), Some("updated_at.desc"));
        assert_eq!(param(&params, "offset"), Some("40"));
        assert_eq!(param(&params, "limit"), Some("20"));
        assert_eq!(param(&params, "or"), None);
        assert_eq!(param(&params, "starred"), None);
    }

    #[test]
    fn list_params_include_search_and_starred() {
        let filter = NotesFilter::new(true, Some("milk, eggs".to_string()));
        let params = list_query_params(&filter, 0, 20);
        assert_eq!(
            param(&params, "or"),
            Some(r#"(title.ilike."*milk, eggs*",content.ilike."*milk, eggs*")"#)
        );
        assert_eq!(param(&params, "starred"), Some("eq.true"));
    }

    #[test]
    fn ilike_pattern_escapes_quotes() {
        assert_eq!(ilike_pattern(r#"say "hi""#), r#""*say \"hi\"*""#);
    }

    #[test]
    fn update_body_stamps_updated_at() {
        let body = update_body(&NotePatch::starred(true)).unwrap();
        assert_eq!(body["starred"], serde_json::Value::Bool(true));
        assert!(body["updated_at"].is_string());
        assert!(body.get("title").is_none());
    }

    #[tokio::test]
    async fn requests_without_session_are_unauthenticated() {
        let config = ClientConfig::new("https://demo.supabase.co", "anon").unwrap();
        let (_tx, rx) = watch::channel(SessionState::signed_out());
        let store = SupabaseNoteStore::new(&config, rx).unwrap();

        assert!(matches!(
            store.current_identity().await,
            Err(Error::Unauthenticated)
        ));
        assert!(matches!(
            store.list_notes(&NotesFilter::default(), 0, 20).await,
            Err(Error::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn identity_follows_published_session() {
        let config = ClientConfig::new("https://demo.supabase.co", "anon").unwrap();
        let (tx, rx) = watch::channel(SessionState::signed_out());
        let store = SupabaseNoteStore::new(&config, rx).unwrap();

        tx.send_replace(SessionState::signed_in(test_session("u-42")));
        assert_eq!(store.current_identity().await.unwrap().id, "u-42");
    }
}
