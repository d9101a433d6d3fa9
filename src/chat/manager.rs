use parking_lot::Mutex;
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::contacts::{ContactPoller, ContactView};
use super::events::{
    ConnectionEvent, ConnectionEventKind, ConnectionState, Generation, SessionEvent, SessionNotice,
};
use super::history::HistoryLoader;
use super::message::{Message, SessionIdentity};
use super::state::SessionState;
use super::target::ConversationTarget;
use crate::api::ChatApi;
use crate::constants::{CONTACT_POLL_INTERVAL_SECS, NOTICE_CHANNEL_CAPACITY};
use crate::transport::Transport;
use crate::utils::HuddleError;

/// Runtime knobs for a session
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Root of the streaming endpoints, e.g. `ws://host/ws/`
    pub connection_base: Url,
    pub contact_poll_interval: Duration,
}

impl SessionSettings {
    pub fn new(connection_base: Url) -> Self {
        Self {
            connection_base,
            contact_poll_interval: Duration::from_secs(CONTACT_POLL_INTERVAL_SECS),
        }
    }
}

/// Outbound half of the connection for the current generation
struct LiveLink {
    generation: Generation,
    outbound: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
}

struct Shared {
    state: SessionState,
    link: Option<LiveLink>,
}

/// Owns the live conversation for one signed-in user
///
/// All mutations of session state run under one lock: user operations
/// directly, connection/history/contact results through a single pump task.
/// Notices are broadcast while that lock is held so subscribers observe them
/// in the order the state changed.
pub struct SessionManager {
    shared: Arc<Mutex<Shared>>,
    transport: Arc<dyn Transport>,
    history: Arc<HistoryLoader>,
    events: mpsc::UnboundedSender<SessionEvent>,
    notices: broadcast::Sender<SessionNotice>,
    root: CancellationToken,
    poller: ContactPoller,
}

impl SessionManager {
    /// Start a session and its contact poller; must run inside a tokio runtime
    pub fn start(
        identity: SessionIdentity,
        settings: SessionSettings,
        api: Arc<dyn ChatApi>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let root = CancellationToken::new();
        let (events, inbox) = mpsc::unbounded_channel();
        let (notices, _) = broadcast::channel(NOTICE_CHANNEL_CAPACITY);

        let shared = Arc::new(Mutex::new(Shared {
            state: SessionState::new(identity.clone(), settings.connection_base),
            link: None,
        }));

        tokio::spawn(pump(shared.clone(), inbox, notices.clone(), root.clone()));
        let poller = ContactPoller::spawn(
            api.clone(),
            settings.contact_poll_interval,
            events.clone(),
            root.child_token(),
        );

        info!(identity = %identity.identity, "session started");

        Self {
            shared,
            transport,
            history: Arc::new(HistoryLoader::new(api, identity)),
            events,
            notices,
            root,
            poller,
        }
    }

    /// Receive change notices from this point on
    pub fn subscribe(&self) -> broadcast::Receiver<SessionNotice> {
        self.notices.subscribe()
    }

    /// Make `target` the active conversation
    ///
    /// Returns once the switch is applied; connection and history arrive
    /// later through notices. Fails with `NotConnected` after `shutdown`.
    pub fn select(&self, target: ConversationTarget) -> Result<(), HuddleError> {
        let mut shared = self.shared.lock();
        if self.root.is_cancelled() {
            return Err(HuddleError::NotConnected);
        }
        let switch = shared.state.select(target)?;

        if let Some(old) = shared.link.take() {
            debug!(generation = %old.generation, "closing previous connection");
            old.cancel.cancel();
        }

        let generation = switch.open.generation;
        let cancel = self.root.child_token();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        shared.link = Some(LiveLink {
            generation,
            outbound,
            cancel: cancel.clone(),
        });

        for notice in switch.notices {
            let _ = self.notices.send(notice);
        }

        tokio::spawn(drive_link(
            self.transport.clone(),
            switch.open.address,
            generation,
            outbound_rx,
            self.events.clone(),
            cancel.clone(),
        ));
        tokio::spawn(fetch_history(
            self.history.clone(),
            switch.open.target,
            generation,
            self.events.clone(),
            cancel,
        ));

        Ok(())
    }

    /// Leave the active conversation, if any
    pub fn clear(&self) {
        let mut shared = self.shared.lock();
        let teardown = shared.state.clear();
        if let Some(link) = shared.link.take() {
            link.cancel.cancel();
        }
        for notice in teardown.notices {
            let _ = self.notices.send(notice);
        }
    }

    /// Hand `text` to the live connection
    ///
    /// Fails immediately unless connected. Nothing is added to the log here;
    /// the message shows up when the server echoes it back.
    pub fn send(&self, text: &str) -> Result<(), HuddleError> {
        let shared = self.shared.lock();
        let (generation, frame) = shared.state.prepare_send(text)?;

        let link = shared
            .link
            .as_ref()
            .filter(|link| link.generation == generation)
            .ok_or(HuddleError::NotConnected)?;
        link.outbound
            .send(frame)
            .map_err(|_| HuddleError::NotConnected)?;

        debug!(%generation, "message queued for send");
        Ok(())
    }

    pub fn messages(&self) -> Vec<Message> {
        self.shared.lock().state.messages().to_vec()
    }

    pub fn active_target(&self) -> Option<ConversationTarget> {
        self.shared.lock().state.active_target().cloned()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.shared.lock().state.connection_state()
    }

    pub fn generation(&self) -> Generation {
        self.shared.lock().state.generation()
    }

    pub fn contacts(&self) -> Vec<ContactView> {
        self.shared.lock().state.contacts().entries()
    }

    pub fn search_contacts(&self, query: &str) -> Vec<ContactView> {
        self.shared.lock().state.contacts().search(query)
    }

    pub fn identity(&self) -> SessionIdentity {
        self.shared.lock().state.identity().clone()
    }

    /// Close the connection and stop every background task
    pub fn shutdown(&self) {
        if self.root.is_cancelled() {
            return;
        }
        self.clear();
        self.poller.cancel();
        self.root.cancel();
        info!("session stopped");
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

/// The serialized event handler
async fn pump(
    shared: Arc<Mutex<Shared>>,
    mut inbox: mpsc::UnboundedReceiver<SessionEvent>,
    notices: broadcast::Sender<SessionNotice>,
    root: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = root.cancelled() => break,
            event = inbox.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let mut guard = shared.lock();
        for notice in guard.state.apply(event) {
            let _ = notices.send(notice);
        }
    }
    debug!("session pump stopped");
}

/// Open the connection for `generation` and relay traffic until cancelled or closed
async fn drive_link(
    transport: Arc<dyn Transport>,
    address: Url,
    generation: Generation,
    mut outbound: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<SessionEvent>,
    cancel: CancellationToken,
) {
    let report = |kind| {
        let _ = events.send(SessionEvent::Connection(ConnectionEvent::new(generation, kind)));
    };

    let connected = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!(%generation, "connect abandoned");
            return;
        }
        connected = transport.connect(&address) => connected,
    };

    let mut link = match connected {
        Ok(link) => link,
        Err(e) => {
            report(ConnectionEventKind::Error(e.to_string()));
            return;
        }
    };
    report(ConnectionEventKind::Opened);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                if let Err(e) = link.close().await {
                    debug!(%generation, error = %e, "close failed");
                }
                break;
            }
            Some(frame) = outbound.recv() => {
                if let Err(e) = link.send_text(frame).await {
                    warn!(%generation, error = %e, "send failed");
                    report(ConnectionEventKind::Error(e.to_string()));
                    break;
                }
            }
            inbound = link.next_text() => match inbound {
                Some(Ok(text)) => report(ConnectionEventKind::Frame(text)),
                Some(Err(e)) => {
                    report(ConnectionEventKind::Error(e.to_string()));
                    break;
                }
                None => {
                    report(ConnectionEventKind::Closed);
                    break;
                }
            },
        }
    }
    debug!(%generation, "connection task finished");
}

async fn fetch_history(
    loader: Arc<HistoryLoader>,
    target: ConversationTarget,
    generation: Generation,
    events: mpsc::UnboundedSender<SessionEvent>,
    cancel: CancellationToken,
) {
    let messages = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        messages = loader.load(&target) => messages,
    };
    let _ = events.send(SessionEvent::HistoryLoaded {
        generation,
        messages,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{HistoryRecord, MockChatApi};
    use async_trait::async_trait;
    use crate::chat::{ContactSummary, HistoryEndpoint, HistoryMerge, Origin};
    use crate::transport::memory::{MemoryTransport, PeerHandle};
    use crate::transport::ChatFrame;
    use pretty_assertions::assert_eq;

    const ME: &str = "me@example.com";
    const BOB: &str = "bob@example.com";

    fn api() -> MockChatApi {
        let mut api = MockChatApi::new();
        api.expect_contacts().returning(|| {
            Ok(vec![
                ContactSummary::new("alice@example.com", "Alice"),
                ContactSummary::new(BOB, "Bob"),
            ])
        });
        api.expect_history().returning(|endpoint| match endpoint {
            HistoryEndpoint::Direct { identity } if identity == BOB => Ok(vec![HistoryRecord {
                message: "hi".to_string(),
                sender: BOB.to_string(),
                sender_name: "Bob".to_string(),
                timestamp: "2024-05-01T10:00:00+00:00".to_string(),
            }]),
            _ => Ok(Vec::new()),
        });
        api
    }

    fn start(api: MockChatApi) -> (SessionManager, mpsc::UnboundedReceiver<PeerHandle>) {
        start_with(Arc::new(api))
    }

    fn start_with(api: Arc<dyn ChatApi>) -> (SessionManager, mpsc::UnboundedReceiver<PeerHandle>) {
        let (transport, peers) = MemoryTransport::new();
        let mut settings = SessionSettings::new(Url::parse("ws://localhost:8000/ws/").unwrap());
        settings.contact_poll_interval = Duration::from_secs(3600);
        let manager = SessionManager::start(
            SessionIdentity::new(ME, "Me"),
            settings,
            api,
            Arc::new(transport),
        );
        (manager, peers)
    }

    async fn eventually<F: Fn() -> bool>(check: F) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition never held");
    }

    async fn next_peer(peers: &mut mpsc::UnboundedReceiver<PeerHandle>) -> PeerHandle {
        tokio::time::timeout(Duration::from_secs(2), peers.recv())
            .await
            .expect("no connection attempt")
            .expect("transport dropped")
    }

    fn texts(manager: &SessionManager) -> Vec<String> {
        manager.messages().into_iter().map(|m| m.text).collect()
    }

    fn record(text: &str, sender: &str) -> HistoryRecord {
        HistoryRecord {
            message: text.to_string(),
            sender: sender.to_string(),
            sender_name: String::new(),
            timestamp: "2024-05-01T10:00:00+00:00".to_string(),
        }
    }

    /// Holds Bob's history back until `release` fires; everything else answers at once
    struct GatedApi {
        release: Arc<tokio::sync::Notify>,
    }

    #[async_trait]
    impl ChatApi for GatedApi {
        async fn history(&self, endpoint: &HistoryEndpoint) -> Result<Vec<HistoryRecord>, HuddleError> {
            match endpoint {
                HistoryEndpoint::Direct { identity } if identity == BOB => {
                    self.release.notified().await;
                    Ok(vec![record("from bob", BOB)])
                }
                _ => Ok(vec![record("from the group", BOB)]),
            }
        }

        async fn contacts(&self) -> Result<Vec<ContactSummary>, HuddleError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_end_to_end_direct_conversation() {
        let (manager, mut peers) = start(api());

        manager.select(ConversationTarget::direct(BOB, "Bob")).unwrap();
        let mut peer = next_peer(&mut peers).await;
        assert_eq!(peer.address.path(), "/ws/personal/bob@example.com/");
        assert_eq!(manager.connection_state(), ConnectionState::Connecting);

        peer.accept();
        eventually(|| manager.connection_state() == ConnectionState::Connected).await;
        eventually(|| texts(&manager) == vec!["hi"]).await;

        manager.send("hello").unwrap();
        let wire = tokio::time::timeout(Duration::from_secs(2), peer.recv())
            .await
            .unwrap()
            .unwrap();
        let sent = ChatFrame::parse(&wire).unwrap();
        assert_eq!(sent.message, "hello");
        assert_eq!(sent.sender, ME);
        assert_eq!(texts(&manager), vec!["hi"]);

        peer.push(wire);
        eventually(|| manager.messages().len() == 2).await;

        let messages = manager.messages();
        assert_eq!(messages[0].origin, Origin::History);
        assert_eq!(messages[1].text, "hello");
        assert!(messages[1].is_from(ME));
        assert_eq!(messages.iter().filter(|m| m.text == "hello").count(), 1);
    }

    #[tokio::test]
    async fn test_switch_closes_previous_connection() {
        let (manager, mut peers) = start(api());

        manager.select(ConversationTarget::direct(BOB, "Bob")).unwrap();
        let mut first = next_peer(&mut peers).await;
        first.accept();
        eventually(|| manager.connection_state() == ConnectionState::Connected).await;

        manager.select(ConversationTarget::group("Night Owls")).unwrap();
        assert!(manager.messages().is_empty());
        assert_eq!(manager.connection_state(), ConnectionState::Connecting);

        let second = next_peer(&mut peers).await;
        assert_eq!(second.address.path(), "/ws/group/Night%20Owls/");
        eventually(|| first.is_abandoned()).await;

        // Anything the old server side still pushes goes nowhere
        first.push(r#"{"message":"late","sender":"bob@example.com"}"#);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(texts(&manager).iter().all(|t| t != "late"));
    }

    #[tokio::test]
    async fn test_switch_while_connecting_abandons_attempt() {
        let (manager, mut peers) = start(api());

        manager.select(ConversationTarget::direct(BOB, "Bob")).unwrap();
        let first = next_peer(&mut peers).await;

        manager.select(ConversationTarget::direct("carol@example.com", "Carol")).unwrap();
        let mut second = next_peer(&mut peers).await;
        eventually(|| first.is_abandoned()).await;

        second.accept();
        eventually(|| manager.connection_state() == ConnectionState::Connected).await;
        assert_eq!(
            manager.active_target().unwrap().identifier(),
            "carol@example.com"
        );
    }

    #[tokio::test]
    async fn test_send_requires_connection() {
        let (manager, mut peers) = start(api());
        assert!(matches!(manager.send("hi"), Err(HuddleError::NotConnected)));

        manager.select(ConversationTarget::direct(BOB, "Bob")).unwrap();
        let mut peer = next_peer(&mut peers).await;
        eventually(|| manager.messages().len() == 1).await;
        assert!(matches!(manager.send("hi"), Err(HuddleError::NotConnected)));

        peer.refuse();
        eventually(|| manager.connection_state() == ConnectionState::Disconnected).await;
        assert!(matches!(manager.send("hi"), Err(HuddleError::NotConnected)));
        assert_eq!(manager.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_server_hang_up_disconnects() {
        let (manager, mut peers) = start(api());
        manager.select(ConversationTarget::group("Night Owls")).unwrap();
        let mut peer = next_peer(&mut peers).await;
        peer.accept();
        eventually(|| manager.connection_state() == ConnectionState::Connected).await;

        peer.hang_up();
        eventually(|| manager.connection_state() == ConnectionState::Disconnected).await;
        assert!(manager.active_target().is_some());
    }

    #[tokio::test]
    async fn test_notices_follow_state_changes() {
        let (manager, mut peers) = start(api());
        let mut notices = manager.subscribe();

        manager.select(ConversationTarget::direct(BOB, "Bob")).unwrap();
        let generation = manager.generation();
        assert_eq!(
            notices.recv().await.unwrap(),
            SessionNotice::TargetChanged(Some(ConversationTarget::direct(BOB, "Bob")))
        );
        assert_eq!(notices.recv().await.unwrap(), SessionNotice::LogCleared);
        assert_eq!(
            notices.recv().await.unwrap(),
            SessionNotice::ConnectionChanged {
                generation,
                state: ConnectionState::Connecting,
            }
        );

        let mut peer = next_peer(&mut peers).await;
        peer.accept();
        let opened = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let SessionNotice::ConnectionChanged { state, .. } = notices.recv().await.unwrap() {
                    return state;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(opened, ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_contacts_highlight_active_target() {
        let (manager, _peers) = start(api());
        eventually(|| manager.contacts().len() == 2).await;
        assert!(manager.contacts().iter().all(|c| !c.selected));

        manager.select(ConversationTarget::direct(BOB, "Bob")).unwrap();
        let selected: Vec<_> = manager
            .contacts()
            .into_iter()
            .filter(|c| c.selected)
            .map(|c| c.summary.identity)
            .collect();
        assert_eq!(selected, vec![BOB.to_string()]);
        assert_eq!(manager.search_contacts("ali").len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_closes_connection() {
        let (manager, mut peers) = start(api());
        manager.select(ConversationTarget::direct(BOB, "Bob")).unwrap();
        let mut peer = next_peer(&mut peers).await;
        peer.accept();
        eventually(|| manager.connection_state() == ConnectionState::Connected).await;

        manager.shutdown();
        eventually(|| peer.is_abandoned()).await;
        assert!(manager.active_target().is_none());
        assert!(matches!(manager.send("hi"), Err(HuddleError::NotConnected)));
    }

    #[tokio::test]
    async fn test_select_after_shutdown_is_refused() {
        let (manager, mut peers) = start(api());
        manager.shutdown();

        assert!(matches!(
            manager.select(ConversationTarget::direct(BOB, "Bob")),
            Err(HuddleError::NotConnected)
        ));
        assert!(manager.active_target().is_none());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(peers.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_history_notice_carries_its_own_batch() {
        let (manager, _peers) = start(api());
        let mut notices = manager.subscribe();

        manager.select(ConversationTarget::direct(BOB, "Bob")).unwrap();
        let first = manager.generation();
        eventually(|| texts(&manager) == vec!["hi"]).await;

        // Read the notice only after the log has moved on to another target
        manager.select(ConversationTarget::group("Night Owls")).unwrap();
        assert!(manager.messages().is_empty());

        let (generation, messages, merge) = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let SessionNotice::HistoryApplied {
                    generation,
                    messages,
                    merge,
                } = notices.recv().await.unwrap()
                {
                    return (generation, messages, merge);
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(generation, first);
        assert_eq!(merge, HistoryMerge::Replaced);
        let batch: Vec<_> = messages.into_iter().map(|m| m.text).collect();
        assert_eq!(batch, vec!["hi"]);
    }

    #[tokio::test]
    async fn test_slow_history_never_reaches_next_target() {
        let release = Arc::new(tokio::sync::Notify::new());
        let (manager, mut peers) = start_with(Arc::new(GatedApi {
            release: release.clone(),
        }));
        let mut notices = manager.subscribe();

        manager.select(ConversationTarget::direct(BOB, "Bob")).unwrap();
        let stale = manager.generation();
        let _bob = next_peer(&mut peers).await;

        manager.select(ConversationTarget::group("Night Owls")).unwrap();
        let current = manager.generation();
        let _group = next_peer(&mut peers).await;
        eventually(|| texts(&manager) == vec!["from the group"]).await;

        release.notify_one();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(texts(&manager), vec!["from the group"]);

        let mut applied = Vec::new();
        while let Ok(notice) = notices.try_recv() {
            if let SessionNotice::HistoryApplied { generation, .. } = notice {
                applied.push(generation);
            }
        }
        assert!(!applied.contains(&stale));
        assert_eq!(applied, vec![current]);
    }
}
