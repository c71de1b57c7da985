//! Session facade.
//!
//! A [`DictionarySession`] is everything one client needs, wired together:
//!
//! ```text
//!   AuthProvider ──watch──▶ identity sync ──Author──▶ write actor
//!                                  │                    │
//!                                  ▼                    ▼
//!                       notification dispatcher   CollectionStore
//!                                  ▲                    │
//!                                  │ insertions         │ value + child-added
//!                                  └──── SyncEngine ◀───┘
//!                                            │ snapshots
//!                     search ──▶ Debouncer ──┴──▶ ViewBuilder ──▶ visible_entries()
//! ```
//!
//! The store handle is injected and may be shared with other sessions; the
//! session connects it but never disposes it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use wordbook_store::{AuthState, SharedAuth, SharedStore};
use wordbook_types::{Account, AccountId, ActorId, EntryDraft, EntryId, Feedback, FeedbackId};

use crate::accounts::{AccountFilter, AccountService, resolve_display_name};
use crate::admin::{AdminService, AdminStats, SortOrder};
use crate::config::ClientConfig;
use crate::debounce::Debouncer;
use crate::error::{AdminError, FeedbackError, SessionError, SyncError, WriteError};
use crate::feedback::FeedbackService;
use crate::identity::{Author, IdentityResolver, SessionStorage};
use crate::notify::{NotificationGate, NotificationSink, spawn_dispatcher};
use crate::sync::{EntryList, SyncEngine, SyncFailure, SyncState};
use crate::view::ViewBuilder;
use crate::writes::{WriteHandle, WritePolicy, spawn_writer};

// ============================================================================
// Identity sync
// ============================================================================

/// Resolve the author (and account record) for an auth state.
///
/// A failure to read or write the account record is logged; the session
/// still acts as the principal, unverified.
async fn resolve_author(
    resolver: &IdentityResolver,
    accounts: &AccountService,
    state: &AuthState,
) -> (Author, Option<Account>) {
    let actor = resolver.resolve(state);
    let Some(principal) = state.principal() else {
        return (Author::anonymous(actor.as_str()), None);
    };
    match accounts.ensure_account(principal).await {
        Ok(account) => (Author::from_account(&account), Some(account)),
        Err(e) => {
            warn!(uid = %principal.uid, error = %e, "account record unavailable");
            let author = Author {
                actor,
                display_name: resolve_display_name(
                    principal.display_name.as_deref(),
                    None,
                    &principal.email,
                ),
                verified: false,
                admin: false,
            };
            (author, None)
        }
    }
}

/// Keeps the published author in step with the auth provider.
struct IdentityState {
    auth: SharedAuth,
    resolver: IdentityResolver,
    accounts: AccountService,
    author_tx: watch::Sender<Author>,
    account: RwLock<Option<Account>>,
    /// Last auth state applied. Held across the account round-trip so
    /// concurrent syncs apply in order.
    applied: tokio::sync::Mutex<AuthState>,
}

impl IdentityState {
    /// Apply the provider's current state if it differs from the last one.
    async fn sync(&self) -> Author {
        let mut applied = self.applied.lock().await;
        let state = self.auth.current();
        if *applied == state {
            return self.author_tx.borrow().clone();
        }

        let (author, account) = resolve_author(&self.resolver, &self.accounts, &state).await;
        info!(actor = %author.actor, kind = %author.actor.kind(), "acting identity changed");
        *self.account.write() = account;
        self.author_tx.send_replace(author.clone());
        *applied = state;
        author
    }
}

async fn watch_auth(identity: Arc<IdentityState>, mut auth_rx: watch::Receiver<AuthState>) {
    while auth_rx.changed().await.is_ok() {
        drop(auth_rx.borrow_and_update());
        identity.sync().await;
    }
    debug!("auth watcher finished");
}

// ============================================================================
// DictionarySession
// ============================================================================

/// One client's live view of the dictionary.
pub struct DictionarySession {
    config: ClientConfig,
    auth: SharedAuth,
    identity: Arc<IdentityState>,
    feedback: FeedbackService,
    admin: AdminService,
    engine: SyncEngine,
    writer: WriteHandle,
    debouncer: Debouncer,
    view: Mutex<ViewBuilder>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl DictionarySession {
    /// Connect, resolve the acting identity, and subscribe to the words
    /// collection. Must be called within a tokio runtime.
    pub async fn start(
        config: ClientConfig,
        store: SharedStore,
        auth: SharedAuth,
        storage: Arc<dyn SessionStorage>,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self, SessionError> {
        store.connect().await?;

        let accounts = AccountService::new(store.clone(), &config);
        let feedback = FeedbackService::new(store.clone(), accounts.clone(), &config);
        let admin = AdminService::new(store.clone(), accounts.clone(), feedback.clone(), &config);

        // Watch first so no change between the two reads is missed.
        let auth_rx = auth.watch();
        let initial = auth.current();
        let resolver = IdentityResolver::new(storage);
        let (author, account) = resolve_author(&resolver, &accounts, &initial).await;
        let (author_tx, author_rx) = watch::channel(author);
        let identity = Arc::new(IdentityState {
            auth: auth.clone(),
            resolver,
            accounts,
            author_tx,
            account: RwLock::new(account),
            applied: tokio::sync::Mutex::new(initial),
        });

        let engine = SyncEngine::new(store.clone());
        let dispatcher = spawn_dispatcher(
            NotificationGate::new(config.initial_load_window()),
            engine.insertions(),
            author_rx,
            sink,
        );
        if let Err(e) = engine.subscribe(&config.words_collection, &config.order_key) {
            dispatcher.abort();
            return Err(e.into());
        }
        let watcher = tokio::spawn(watch_auth(identity.clone(), auth_rx));

        let debouncer = Debouncer::spawn(config.search_debounce());
        let writer = spawn_writer(
            store,
            config.words_collection.clone(),
            WritePolicy::from_config(&config),
        );

        info!(actor = %identity.author_tx.borrow().actor, "session started");
        Ok(Self {
            config,
            auth,
            identity,
            feedback,
            admin,
            engine,
            writer,
            debouncer,
            view: Mutex::new(ViewBuilder::new()),
            tasks: Mutex::new(vec![dispatcher, watcher]),
            closed: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn check_open(&self) -> Result<(), SessionError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SessionError::Closed);
        }
        Ok(())
    }

    // ── Identity ────────────────────────────────────────────────────────

    pub fn author(&self) -> Author {
        self.identity.author_tx.borrow().clone()
    }

    pub fn actor(&self) -> ActorId {
        self.identity.author_tx.borrow().actor.clone()
    }

    pub fn watch_author(&self) -> watch::Receiver<Author> {
        self.identity.author_tx.subscribe()
    }

    /// The signed-in account record, if any.
    pub fn account(&self) -> Option<Account> {
        self.identity.account.read().clone()
    }

    fn acting_uid(&self) -> Option<AccountId> {
        self.actor().account_id().cloned()
    }

    /// Register, sign in, and wait until the session acts as the new account.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<Author, SessionError> {
        self.check_open()?;
        self.auth.sign_up(email, password, display_name).await?;
        Ok(self.identity.sync().await)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Author, SessionError> {
        self.check_open()?;
        self.auth.sign_in(email, password).await?;
        Ok(self.identity.sync().await)
    }

    /// Sign out and fall back to the anonymous session id.
    pub async fn sign_out(&self) -> Result<Author, SessionError> {
        self.check_open()?;
        self.auth.sign_out().await?;
        Ok(self.identity.sync().await)
    }

    // ── Live view ───────────────────────────────────────────────────────

    pub fn sync_state(&self) -> SyncState {
        self.engine.state()
    }

    /// The full sorted cache, unfiltered.
    pub fn entries(&self) -> EntryList {
        self.engine.current()
    }

    pub fn snapshots(&self) -> watch::Receiver<EntryList> {
        self.engine.snapshots()
    }

    pub fn sync_errors(&self) -> tokio::sync::broadcast::Receiver<SyncFailure> {
        self.engine.errors()
    }

    /// Feed raw search input; the view picks it up once it settles.
    pub fn search(&self, raw: &str) {
        self.debouncer.input(raw);
    }

    pub fn search_term(&self) -> String {
        self.debouncer.current()
    }

    pub fn settled_search(&self) -> watch::Receiver<String> {
        self.debouncer.settled()
    }

    /// The cache filtered by the settled search term.
    pub fn visible_entries(&self) -> EntryList {
        let entries = self.engine.current();
        let term = self.debouncer.current();
        self.view.lock().view(&entries, &term)
    }

    /// Re-open the live subscription, e.g. after a failed start.
    pub fn resubscribe(&self) -> Result<(), SyncError> {
        self.engine
            .subscribe(&self.config.words_collection, &self.config.order_key)
            .map(|_| ())
    }

    // ── Writes ──────────────────────────────────────────────────────────

    pub async fn create(
        &self,
        text: &str,
        meaning: &str,
        example: Option<&str>,
    ) -> Result<EntryId, WriteError> {
        self.writer
            .create(self.author(), EntryDraft::new(text, meaning, example))
            .await
    }

    pub async fn update(
        &self,
        id: &EntryId,
        text: &str,
        meaning: &str,
        example: Option<&str>,
    ) -> Result<(), WriteError> {
        self.writer
            .update(self.author(), id.clone(), EntryDraft::new(text, meaning, example))
            .await
    }

    pub async fn toggle_favorite(&self, id: &EntryId, current: bool) -> Result<bool, WriteError> {
        self.writer
            .toggle_favorite(self.author(), id.clone(), current)
            .await
    }

    pub async fn delete(&self, id: &EntryId) -> Result<(), WriteError> {
        self.writer.delete(self.author(), id.clone()).await
    }

    // ── Feedback ────────────────────────────────────────────────────────

    /// Send feedback, tagged with the account email when signed in.
    pub async fn submit_feedback(&self, message: &str) -> Result<FeedbackId, FeedbackError> {
        let email = self.account().map(|a| a.email);
        self.feedback.submit(message, email.as_deref()).await
    }

    // ── Admin ───────────────────────────────────────────────────────────

    pub async fn admin_stats(&self) -> Result<AdminStats, AdminError> {
        self.admin.stats(self.acting_uid().as_ref()).await
    }

    pub async fn manage_words(
        &self,
        search: &str,
        order: SortOrder,
    ) -> Result<Vec<wordbook_types::Entry>, AdminError> {
        self.admin
            .manage_words(self.acting_uid().as_ref(), search, order)
            .await
    }

    pub async fn list_accounts(
        &self,
        filter: AccountFilter,
        search: &str,
    ) -> Result<Vec<Account>, AdminError> {
        self.identity
            .accounts
            .list_accounts(self.acting_uid().as_ref(), filter, search)
            .await
    }

    pub async fn set_verified(&self, uid: &AccountId, verified: bool) -> Result<(), AdminError> {
        self.identity
            .accounts
            .set_verified(self.acting_uid().as_ref(), uid, verified)
            .await
    }

    pub async fn delete_account(&self, uid: &AccountId) -> Result<(), AdminError> {
        self.identity
            .accounts
            .delete_account(self.acting_uid().as_ref(), uid)
            .await
    }

    pub async fn list_feedback(&self, search: &str) -> Result<Vec<Feedback>, AdminError> {
        self.feedback.list(self.acting_uid().as_ref(), search).await
    }

    pub async fn mark_feedback_read(&self, id: &FeedbackId, read: bool) -> Result<(), AdminError> {
        self.feedback
            .mark_read(self.acting_uid().as_ref(), id, read)
            .await
    }

    pub async fn delete_feedback(&self, id: &FeedbackId) -> Result<(), AdminError> {
        self.feedback.delete(self.acting_uid().as_ref(), id).await
    }

    pub async fn unread_feedback(&self) -> Result<usize, AdminError> {
        self.feedback.unread_count(self.acting_uid().as_ref()).await
    }

    // ── Teardown ────────────────────────────────────────────────────────

    /// Unsubscribe and stop background tasks. Idempotent.
    ///
    /// No notification or snapshot is delivered after this returns.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.engine.unsubscribe();
        self.debouncer.shutdown();
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        info!("session shut down");
    }
}

impl Drop for DictionarySession {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}
