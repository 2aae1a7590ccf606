//! A thin client for a Supabase project's PostgREST endpoint.
//!
//! Only the pieces TripSync needs: filtered selects, inserts that return
//! their representation, filtered updates and deletes, and upserts that
//! ignore duplicates. Realtime push is not handled here; the host shell
//! owns the websocket and forwards notifications into a
//! [`ChangeHub`](crate::ChangeHub).

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StoreError;

#[derive(serde::Serialize, serde::Deserialize, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct SupabaseConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

enum Verb {
    Get,
    Post,
    Patch,
    Delete,
}

/// No request body. `Option<&NoBody>` spells "never" for calls that only
/// carry a URL.
#[derive(Serialize)]
struct NoBody {}

const NO_BODY: Option<&NoBody> = None;

pub struct SupabaseClient {
    config: SupabaseConfig,
    access_token: Option<String>,
}

impl SupabaseClient {
    pub fn new(config: SupabaseConfig, access_token: Option<String>) -> Self {
        SupabaseClient {
            config,
            access_token,
        }
    }

    fn rest_url(&self, table: &str, query: &str) -> String {
        let base = &self.config.supabase_url;
        if query.is_empty() {
            format!("{base}/rest/v1/{table}")
        } else {
            format!("{base}/rest/v1/{table}?{query}")
        }
    }

    async fn send<T: Serialize>(
        &self,
        verb: Verb,
        url: &str,
        prefer: Option<&str>,
        body: Option<&T>,
    ) -> Result<fetch_happen::Response, StoreError> {
        let client = fetch_happen::Client;
        let request = match verb {
            Verb::Get => client.get(url),
            Verb::Post => client.post(url),
            Verb::Patch => client.patch(url),
            Verb::Delete => client.delete(url),
        };

        // PostgREST authenticates every call; the anon key doubles as the
        // bearer token for signed-out reads of public rows.
        let token = self
            .access_token
            .as_deref()
            .unwrap_or(&self.config.supabase_anon_key);
        let request = request
            .header("apikey", &self.config.supabase_anon_key)
            .header("Authorization", format!("Bearer {token}"));
        let request = match prefer {
            Some(value) => request.header("Prefer", value),
            None => request,
        };
        let request = match body {
            Some(body) => request
                .json(body)
                .map_err(|e| StoreError::Rejected(format!("{e:?}")))?,
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Rejected(format!("{e:?}")))?;
        if response.ok() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        log::warn!("supabase request failed with status {status}: {body}");
        match status {
            404 | 406 => Err(StoreError::NotFound),
            409 => Err(StoreError::Conflict(body)),
            _ => Err(StoreError::Rejected(format!("status {status}: {body}"))),
        }
    }

    async fn parse<T: DeserializeOwned>(
        &self,
        response: fetch_happen::Response,
    ) -> Result<T, StoreError> {
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Rejected(format!("{e:?}")))?;
        serde_json::from_str(&body).map_err(|e| {
            StoreError::Rejected(format!("failed to parse response: {e}. Body: {body}"))
        })
    }

    /// `GET /rest/v1/{table}?{query}`: rows matching a PostgREST filter
    /// string such as `trip_id=eq.7&order=day_index.asc`.
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
    ) -> Result<Vec<T>, StoreError> {
        let response = self
            .send(Verb::Get, &self.rest_url(table, query), None, NO_BODY)
            .await?;
        self.parse(response).await
    }

    /// Like [`select`](Self::select) but expects exactly one row;
    /// `NotFound` when the filter matched nothing.
    pub async fn select_single<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
    ) -> Result<T, StoreError> {
        let mut rows: Vec<T> = self.select(table, query).await?;
        if rows.len() > 1 {
            log::warn!("expected one row from {table}, got {}", rows.len());
        }
        match rows.pop() {
            Some(row) => Ok(row),
            None => Err(StoreError::NotFound),
        }
    }

    /// `POST /rest/v1/{table}` returning the created representation.
    pub async fn insert<T: Serialize, R: DeserializeOwned>(
        &self,
        table: &str,
        row: &T,
    ) -> Result<Vec<R>, StoreError> {
        let response = self
            .send(
                Verb::Post,
                &self.rest_url(table, ""),
                Some("return=representation"),
                Some(row),
            )
            .await?;
        self.parse(response).await
    }

    /// Insert unless a row with the same unique key already exists, in which
    /// case the insert is dropped and the returned list is empty. Callers
    /// re-select to fetch the surviving row.
    pub async fn insert_or_ignore<T: Serialize, R: DeserializeOwned>(
        &self,
        table: &str,
        conflict_columns: &str,
        row: &T,
    ) -> Result<Vec<R>, StoreError> {
        let url = self.rest_url(table, &format!("on_conflict={conflict_columns}"));
        let response = self
            .send(
                Verb::Post,
                &url,
                Some("resolution=ignore-duplicates,return=representation"),
                Some(row),
            )
            .await?;
        self.parse(response).await
    }

    /// `PATCH /rest/v1/{table}?{query}` with a partial row.
    pub async fn update<T: Serialize>(
        &self,
        table: &str,
        query: &str,
        patch: &T,
    ) -> Result<(), StoreError> {
        self.send(Verb::Patch, &self.rest_url(table, query), None, Some(patch))
            .await?;
        Ok(())
    }

    /// `DELETE /rest/v1/{table}?{query}`.
    pub async fn delete(&self, table: &str, query: &str) -> Result<(), StoreError> {
        self.send(Verb::Delete, &self.rest_url(table, query), None, NO_BODY)
            .await?;
        Ok(())
    }
}
