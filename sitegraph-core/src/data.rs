use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Result, params};
use serde::{Deserialize, Serialize};
use sitegraph_scanner::crawler::CrawlSession;
use sitegraph_scanner::graph::{PageState, SiteGraph};
use sitegraph_scanner::normalize::NormalizedUrl;
use sitegraph_scanner::result::FetchStatus;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

pub struct Database {
    conn: Connection,
}

/// A stored crawl session with its page and link counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub root_url: String,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub status: String,
    pub configuration: Option<String>,
    pub page_count: usize,
    pub link_count: usize,
}

fn current_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Stored rows that no longer make a valid graph.
fn corrupt<E>(column: usize, err: E) -> rusqlite::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, err.into())
}

impl Database {
    pub fn drop(path: &Path) -> std::io::Result<()> {
        fs::remove_file(path)
    }

    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::configure(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::configure(Connection::open_in_memory()?)
    }

    fn configure(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
CREATE TABLE IF NOT EXISTS crawl_sessions (
    id TEXT PRIMARY KEY,
    root_url TEXT NOT NULL,
    start_time INTEGER NOT NULL,
    end_time INTEGER,
    status TEXT NOT NULL CHECK(status IN (
        'running', 'completed', 'limit_reached', 'cancelled', 'deadline_exceeded', 'failed'
    )),
    configuration TEXT        -- JSON CrawlConfig
);

CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    url TEXT NOT NULL,
    discovery_order INTEGER NOT NULL,
    depth INTEGER NOT NULL,
    state TEXT NOT NULL CHECK(state IN (
        'discovered', 'fetching', 'expanded', 'fetch_failed', 'disallowed'
    )),
    status_code INTEGER,
    fetch_status TEXT,
    error TEXT,
    UNIQUE(session_id, url),
    FOREIGN KEY(session_id) REFERENCES crawl_sessions(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    source_id INTEGER NOT NULL,
    target_id INTEGER NOT NULL,
    UNIQUE(session_id, source_id, target_id),
    FOREIGN KEY(session_id) REFERENCES crawl_sessions(id) ON DELETE CASCADE,
    FOREIGN KEY(source_id) REFERENCES pages(id) ON DELETE CASCADE,
    FOREIGN KEY(target_id) REFERENCES pages(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_pages_session ON pages(session_id);
CREATE INDEX IF NOT EXISTS idx_links_session ON links(session_id);
CREATE INDEX IF NOT EXISTS idx_links_target ON links(target_id);
            ",
        )?;
        Ok(())
    }

    // Session management
    pub fn create_session(&self, root_url: &str, configuration: Option<&str>) -> Result<String> {
        self.insert_session(root_url, current_timestamp(), configuration)
    }

    fn insert_session(
        &self,
        root_url: &str,
        start_time: i64,
        configuration: Option<&str>,
    ) -> Result<String> {
        let session_id = uuid::Uuid::new_v4().to_string();

        self.conn.execute(
            "INSERT INTO crawl_sessions (id, root_url, start_time, status, configuration)
             VALUES (?1, ?2, ?3, 'running', ?4)",
            params![&session_id, root_url, start_time, configuration],
        )?;

        Ok(session_id)
    }

    /// Close a session with a final status such as `completed` or `cancelled`.
    pub fn finish_session(&self, session_id: &str, status: &str) -> Result<()> {
        self.close_session(session_id, status, current_timestamp())
    }

    fn close_session(&self, session_id: &str, status: &str, end_time: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE crawl_sessions SET status = ?1, end_time = ?2 WHERE id = ?3",
            params![status, end_time, session_id],
        )?;
        Ok(())
    }

    pub fn fail_session(&self, session_id: &str) -> Result<()> {
        self.finish_session(session_id, "failed")
    }

    /// Store every page and link of `graph` under `session_id`, in one
    /// transaction.
    pub fn save_graph(&self, session_id: &str, graph: &SiteGraph) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        let mut page_ids: HashMap<&NormalizedUrl, i64> = HashMap::new();

        {
            let mut insert_page = tx.prepare(
                "INSERT INTO pages (
                    session_id, url, discovery_order, depth, state,
                    status_code, fetch_status, error
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for page in graph.nodes() {
                insert_page.execute(params![
                    session_id,
                    page.url.as_str(),
                    page.order as i64,
                    page.depth,
                    page.state.as_str(),
                    page.status_code,
                    page.fetch_status.map(|s| s.as_str()),
                    &page.error,
                ])?;
                page_ids.insert(&page.url, tx.last_insert_rowid());
            }

            let mut insert_link = tx.prepare(
                "INSERT INTO links (session_id, source_id, target_id) VALUES (?1, ?2, ?3)",
            )?;
            for link in graph.edges() {
                if let (Some(src), Some(dst)) =
                    (page_ids.get(&link.source), page_ids.get(&link.target))
                {
                    insert_link.execute(params![session_id, src, dst])?;
                }
            }
        }

        tx.commit()?;
        debug!(
            "Saved {} pages and {} links for session {}",
            graph.node_count(),
            graph.edge_count(),
            session_id
        );
        Ok(())
    }

    /// Persist a finished crawl and return its session id. The stored start
    /// and end times are those of the crawl, not of the save.
    pub fn save_crawl(&self, session: &CrawlSession, configuration: Option<&str>) -> Result<String> {
        let summary = &session.summary;
        let session_id =
            self.insert_session(session.root.as_str(), summary.started_at, configuration)?;
        if let Err(e) = self.save_graph(&session_id, &session.graph) {
            self.fail_session(&session_id)?;
            return Err(e);
        }
        let end_time = summary.started_at + summary.elapsed.as_secs() as i64;
        self.close_session(&session_id, summary.outcome.as_str(), end_time)?;
        Ok(session_id)
    }

    pub fn list_sessions(&self) -> Result<Vec<SessionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.id, s.root_url, s.start_time, s.end_time, s.status, s.configuration,
                    (SELECT COUNT(*) FROM pages p WHERE p.session_id = s.id),
                    (SELECT COUNT(*) FROM links l WHERE l.session_id = s.id)
             FROM crawl_sessions s
             ORDER BY s.start_time DESC, s.rowid DESC",
        )?;

        let sessions = stmt
            .query_map([], session_from_row)?
            .collect::<Result<Vec<_>>>()?;

        Ok(sessions)
    }

    pub fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        self.conn
            .query_row(
                "SELECT s.id, s.root_url, s.start_time, s.end_time, s.status, s.configuration,
                        (SELECT COUNT(*) FROM pages p WHERE p.session_id = s.id),
                        (SELECT COUNT(*) FROM links l WHERE l.session_id = s.id)
                 FROM crawl_sessions s
                 WHERE s.id = ?1",
                params![session_id],
                session_from_row,
            )
            .optional()
    }

    /// Rebuild the graph stored for `session_id`. Pages come back in their
    /// original discovery order, links in insertion order.
    pub fn load_graph(&self, session_id: &str) -> Result<SiteGraph> {
        let mut graph = SiteGraph::new();
        let mut urls: HashMap<i64, NormalizedUrl> = HashMap::new();

        let mut stmt = self.conn.prepare(
            "SELECT id, url, depth, state, status_code, fetch_status, error
             FROM pages WHERE session_id = ?1 ORDER BY discovery_order",
        )?;
        let mut rows = stmt.query(params![session_id])?;
        while let Some(row) = rows.next()? {
            let id: i64 = row.get(0)?;
            let url_str: String = row.get(1)?;
            let url = NormalizedUrl::parse(&url_str).map_err(|e| corrupt(1, e))?;
            let state_str: String = row.get(3)?;
            let fetch_status: Option<String> = row.get(5)?;

            graph.insert_page(url.clone(), row.get(2)?);
            let page = graph.page_mut(&url).map_err(|e| corrupt(1, e))?;
            page.state = PageState::parse(&state_str)
                .ok_or_else(|| corrupt(3, format!("unknown page state {:?}", state_str)))?;
            page.status_code = row.get(4)?;
            page.fetch_status = fetch_status
                .map(|s| {
                    FetchStatus::parse(&s)
                        .ok_or_else(|| corrupt(5, format!("unknown fetch status {:?}", s)))
                })
                .transpose()?;
            page.error = row.get(6)?;

            urls.insert(id, url);
        }

        let mut stmt = self.conn.prepare(
            "SELECT source_id, target_id FROM links WHERE session_id = ?1 ORDER BY id",
        )?;
        let links = stmt
            .query_map(params![session_id], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<Result<Vec<_>>>()?;

        for (src, dst) in links {
            if let (Some(source), Some(target)) = (urls.get(&src), urls.get(&dst)) {
                graph.add_edge(source, target).map_err(|e| corrupt(0, e))?;
            }
        }

        Ok(graph)
    }

    pub fn delete_session(&self, session_id: &str) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM crawl_sessions WHERE id = ?1", params![session_id])?;
        Ok(deleted > 0)
    }

    /// Raw connection, for queries this type does not wrap.
    pub fn get_connection(&self) -> &Connection {
        &self.conn
    }
}

fn session_from_row(row: &rusqlite::Row<'_>) -> Result<SessionRecord> {
    Ok(SessionRecord {
        id: row.get(0)?,
        root_url: row.get(1)?,
        start_time: row.get(2)?,
        end_time: row.get(3)?,
        status: row.get(4)?,
        configuration: row.get(5)?,
        page_count: row.get::<_, i64>(6)? as usize,
        link_count: row.get::<_, i64>(7)? as usize,
    })
}
