use std::{collections::HashMap, fmt::Display};

use chrono::{Local, NaiveDate, NaiveDateTime};
use log::{debug, info, warn};
use rand::Rng;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::{
    catch_log::{CatchLog, ValidationError},
    config::Config,
    dashboard::{CatchRow, Dashboard},
    models::{Submission, Variant},
};

/// Source of "now" for timestamps and for deciding what "today" is.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

impl Clock for NaiveDateTime {
    fn now(&self) -> NaiveDateTime {
        *self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    fn generate() -> Self {
        Self(format!("{:032x}", rand::thread_rng().gen::<u128>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a successful submission hands back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct Receipt {
    pub record: CatchRow,
    pub dashboard: Dashboard,
}

/// One visitor's catches.
#[derive(Debug)]
pub struct Session {
    log: CatchLog,
    histogram_bins: usize,
    last_seen: NaiveDateTime,
}

impl Session {
    pub fn new(variant: Variant, histogram_bins: usize, now: NaiveDateTime) -> Self {
        Self {
            log: CatchLog::new(variant),
            histogram_bins,
            last_seen: now,
        }
    }

    /// Validates and logs a catch, then recomputes the dashboard for the day of
    /// the catch.
    pub fn submit_catch(
        &mut self,
        submission: Submission,
        now: NaiveDateTime,
    ) -> Result<Receipt, ValidationError> {
        let record = CatchRow::from(self.log.append(submission, now)?);

        Ok(Receipt {
            record,
            dashboard: self.dashboard(now.date()),
        })
    }

    pub fn dashboard(&self, today: NaiveDate) -> Dashboard {
        Dashboard::build(&self.log, today, self.histogram_bins)
    }

    pub fn log(&self) -> &CatchLog {
        &self.log
    }
}

/// Tells the caller which session served a request and whether it has just
/// been created (and therefore needs a cookie).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub id: SessionId,
    pub created: bool,
}

/// All live sessions, each owning an independent [`CatchLog`].
#[derive(Debug)]
pub struct SessionStore {
    variant: Variant,
    histogram_bins: usize,
    max_sessions: usize,
    sessions: Mutex<HashMap<SessionId, Session>>,
}

impl SessionStore {
    pub fn new(config: &Config) -> Self {
        Self {
            variant: config.variant,
            histogram_bins: config.histogram_bins,
            max_sessions: config.max_sessions.max(1),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Runs `f` against the session named by `cookie` without creating one.
    ///
    /// Visitors without a known session see an empty, unsaved log.
    pub async fn view<R>(
        &self,
        cookie: Option<&str>,
        now: NaiveDateTime,
        f: impl FnOnce(&Session) -> R,
    ) -> R {
        let mut sessions = self.sessions.lock().await;

        let session = match cookie {
            Some(id) => sessions.get_mut(&SessionId(id.to_string())),
            None => None,
        };

        match session {
            Some(session) => {
                session.last_seen = now;
                f(session)
            }
            None => f(&Session::new(self.variant, self.histogram_bins, now)),
        }
    }

    /// Runs `f` against the session named by `cookie`.
    ///
    /// Unknown ids, e.g. from before a restart, get a fresh session.
    pub async fn with_session<R>(
        &self,
        cookie: Option<&str>,
        now: NaiveDateTime,
        f: impl FnOnce(&mut Session) -> R,
    ) -> (SessionHandle, R) {
        let mut sessions = self.sessions.lock().await;

        let known = cookie
            .map(|id| SessionId(id.to_string()))
            .filter(|id| sessions.contains_key(id));

        let handle = match known {
            Some(id) => SessionHandle { id, created: false },
            None => {
                if sessions.len() >= self.max_sessions {
                    Self::evict(&mut sessions);
                }

                let id = SessionId::generate();
                debug!("Starting session {id}");
                SessionHandle { id, created: true }
            }
        };

        let session = sessions
            .entry(handle.id.clone())
            .or_insert_with(|| Session::new(self.variant, self.histogram_bins, now));
        session.last_seen = now;
        let value = f(session);

        (handle, value)
    }

    /// Drops the least recently used session, preferring ones without catches.
    fn evict(sessions: &mut HashMap<SessionId, Session>) {
        let oldest_empty = sessions
            .iter()
            .filter(|(_, session)| session.log.is_empty())
            .min_by_key(|(_, session)| session.last_seen)
            .map(|(id, _)| id.clone());

        if let Some(id) = oldest_empty {
            info!("Session limit reached, dropping empty session {id}");
            sessions.remove(&id);
            return;
        }

        let oldest = sessions
            .iter()
            .min_by_key(|(_, session)| session.last_seen)
            .map(|(id, _)| id.clone());

        if let Some(id) = oldest {
            if let Some(session) = sessions.remove(&id) {
                warn!(
                    "Session limit reached, dropping session {id} with {} catches",
                    session.log.len()
                );
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catch_log::tests::{at, submission};

    fn store(variant: Variant, max_sessions: usize) -> SessionStore {
        SessionStore::new(&Config {
            variant,
            max_sessions,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn new_visitor_gets_a_session() {
        let store = store(Variant::Classic, 8);

        let (handle, len) = store
            .with_session(None, at(18, 9), |session| session.log().len())
            .await;

        assert!(handle.created);
        assert_eq!(handle.id.as_str().len(), 32);
        assert_eq!(len, 0);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = store(Variant::Classic, 8);

        let (ann, receipt) = store
            .with_session(None, at(18, 9), |session| {
                session.submit_catch(submission("Ann", 12.0), at(18, 9))
            })
            .await;
        let receipt = receipt.unwrap();
        assert_eq!(receipt.record.technician, "Ann");
        assert_eq!(receipt.dashboard.catches.len(), 1);

        let (bob, dashboard) = store
            .with_session(None, at(18, 10), |session| session.dashboard(at(18, 10).date()))
            .await;
        assert_ne!(ann.id, bob.id);
        assert!(dashboard.is_empty());
        let stranger = store
            .view(None, at(18, 10), |session| session.dashboard(at(18, 10).date()))
            .await;
        assert!(stranger.is_empty());

        let (again, dashboard) = store
            .with_session(Some(ann.id.as_str()), at(18, 11), |session| {
                session.dashboard(at(18, 11).date())
            })
            .await;
        assert_eq!(again.id, ann.id);
        assert!(!again.created);
        assert_eq!(dashboard.catches.len(), 1);
    }

    #[tokio::test]
    async fn unknown_cookie_starts_fresh_session() {
        let store = store(Variant::Classic, 8);

        let (handle, _) = store
            .with_session(Some("deadbeef"), at(18, 9), |_| ())
            .await;

        assert!(handle.created);
        assert_ne!(handle.id.as_str(), "deadbeef");
    }

    #[tokio::test]
    async fn rejected_submission_keeps_log() {
        let store = store(Variant::Tagging, 8);

        let (_, (result, len)) = store
            .with_session(None, at(18, 9), |session| {
                let mut tagged = submission("Ann", 12.0);
                tagged.tagged = true;
                let result = session.submit_catch(tagged, at(18, 9));
                (result.map(|_| ()), session.log().len())
            })
            .await;

        assert_eq!(result, Err(ValidationError::MissingTagNumber));
        assert_eq!(len, 0);
    }

    #[tokio::test]
    async fn least_recently_used_session_is_evicted() {
        let store = store(Variant::Classic, 2);

        let (first, _) = store.with_session(None, at(18, 8), |_| ()).await;
        let (second, _) = store.with_session(None, at(18, 9), |_| ()).await;
        store
            .with_session(Some(first.id.as_str()), at(18, 10), |_| ())
            .await;
        let (third, _) = store.with_session(None, at(18, 11), |_| ()).await;

        assert_eq!(store.len().await, 2);
        let (first_again, _) = store
            .with_session(Some(first.id.as_str()), at(18, 12), |_| ())
            .await;
        assert!(!first_again.created);
        let (second_again, _) = store
            .with_session(Some(second.id.as_str()), at(18, 13), |_| ())
            .await;
        assert!(second_again.created);
        assert_ne!(third.id, second_again.id);
    }

    #[tokio::test]
    async fn viewing_does_not_create_sessions() {
        let store = store(Variant::Classic, 8);

        let empty = store
            .view(None, at(18, 9), |session| session.dashboard(at(18, 9).date()))
            .await;
        let unknown = store
            .view(Some("deadbeef"), at(18, 9), |session| session.log().len())
            .await;

        assert!(empty.is_empty());
        assert_eq!(unknown, 0);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn viewing_known_session_sees_its_catches() {
        let store = store(Variant::Classic, 8);
        let (ann, _) = store
            .with_session(None, at(18, 9), |session| {
                session.submit_catch(submission("Ann", 12.0), at(18, 9))
            })
            .await;

        let len = store
            .view(Some(ann.id.as_str()), at(18, 10), |session| session.log().len())
            .await;

        assert_eq!(len, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn eviction_prefers_sessions_without_catches() {
        let store = store(Variant::Classic, 2);

        let (ann, _) = store
            .with_session(None, at(18, 8), |session| {
                session.submit_catch(submission("Ann", 12.0), at(18, 8))
            })
            .await;
        let (rejected, _) = store
            .with_session(None, at(18, 9), |session| {
                session.submit_catch(submission("", 12.0), at(18, 9))
            })
            .await;
        store.with_session(None, at(18, 10), |_| ()).await;

        let ann_len = store
            .view(Some(ann.id.as_str()), at(18, 11), |session| session.log().len())
            .await;
        assert_eq!(ann_len, 1);
        let (rejected_again, _) = store
            .with_session(Some(rejected.id.as_str()), at(18, 12), |_| ())
            .await;
        assert!(rejected_again.created);
    }

    #[tokio::test]
    async fn full_sessions_are_evicted_oldest_first() {
        let store = store(Variant::Classic, 2);

        let mut ids = Vec::new();
        for (hour, name) in [(8, "Ann"), (9, "Bob"), (10, "Cid")] {
            let (handle, _) = store
                .with_session(None, at(18, hour), |session| {
                    session.submit_catch(submission(name, 12.0), at(18, hour))
                })
                .await;
            ids.push(handle.id);
        }

        let lens: Vec<usize> = logged_counts(&store, &ids).await;
        assert_eq!(lens, [0, 1, 1]);
    }

    async fn logged_counts(store: &SessionStore, ids: &[SessionId]) -> Vec<usize> {
        let mut lens = Vec::new();
        for id in ids {
            lens.push(
                store
                    .view(Some(id.as_str()), at(18, 12), |session| session.log().len())
                    .await,
            );
        }
        lens
    }
}
