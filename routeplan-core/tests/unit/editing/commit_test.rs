use super::*;
use crate::helpers::models::*;
use crate::helpers::services::*;
use crate::helpers::utils::create_logging_environment;
use std::sync::Mutex;

const ROUTE_1: RouteKey = RouteKey::Main(1);
const ROUTE_2: RouteKey = RouteKey::Main(2);

struct TestContext {
    store: Arc<FlakyRouteStore>,
    geometry: Arc<TestGeometryService>,
    notifier: Arc<TestNotificationService>,
    messages: Arc<Mutex<Vec<String>>>,
    coordinator: CommitCoordinator,
}

impl TestContext {
    fn new(geometry: TestGeometryService, notifier: TestNotificationService) -> Self {
        let store = Arc::new(FlakyRouteStore::default());
        let geometry = Arc::new(geometry);
        let notifier = Arc::new(notifier);
        let (environment, messages) = create_logging_environment();

        let coordinator = CommitCoordinator::new(store.clone(), geometry.clone(), notifier.clone(), environment);

        Self { store, geometry, notifier, messages, coordinator }
    }

    fn has_message(&self, text: &str) -> bool {
        self.messages.lock().unwrap().iter().any(|msg| msg.contains(text))
    }

    /// Adds persisted route to both registry and store.
    fn persist(&self, registry: &mut RouteRegistry, route: Route) {
        let id = route.persisted_id.clone().expect("route should have persisted id");
        self.store.inner.insert(id, document_of(&route));

        if route.key.is_external() {
            registry.add_external(route).expect("cannot add external route");
        } else {
            let key = route.key.clone();
            registry.set(&key, |_| Some(route));
        }
    }

    fn document(&self, id: &str) -> RouteDocument {
        self.store.inner.read_one(id).expect("cannot read").expect("no document")
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new(TestGeometryService::default(), TestNotificationService::default())
    }
}

/// Creates registry with persisted draft `route-1` (`a0..a2`, id `r1`) and new `route-2` (`b0`, `b1`).
fn create_draft_registry(ctx: &TestContext) -> RouteRegistry {
    let mut registry = create_registry(3, 2);
    ctx.persist(&mut registry, persisted_route(ROUTE_1, "r1", test_stops("a", 3), RouteStatus::Draft, None));

    registry
}

#[test]
fn can_commit_persisted_and_new_routes() {
    let ctx = TestContext::default();
    let mut registry = create_draft_registry(&ctx);
    let mut buffer = EditBuffer::default();
    buffer.move_stop(&registry, &ROUTE_1, &ROUTE_2, 0, 0).unwrap();

    let result = ctx.coordinator.apply_all(&mut buffer, &mut registry).expect("cannot commit");

    assert_eq!(result.applied, vec![ROUTE_1, ROUTE_2]);
    assert_eq!(result.created.len(), 1);
    assert!(buffer.is_empty());

    let created_id = result.created[0].1.clone();
    assert_eq!(result.created[0].0, ROUTE_2);
    assert_eq!(registry.get(&ROUTE_2).and_then(|route| route.persisted_id.clone()), Some(created_id.clone()));
    assert_stop_ids!(ctx.document(&created_id).stops, ["a0", "b0", "b1"]);

    let document = ctx.document("r1");
    assert_stop_ids!(document.stops, ["a1", "a2"]);
    assert_eq!(document.modifications.len(), 2);
    assert!(document.modifications.iter().all(|modification| modification.modification_type == ChangeType::Sequence));
    assert_eq!(document.geometry.map(|geometry| geometry.encoded_polyline), Some("polyline-2".to_string()));

    let route = registry.get(&ROUTE_1).unwrap();
    assert_stop_ids!(route.stops, ["a1", "a2"]);
    assert!(route.geometry.is_some());

    assert_eq!(result.changes[&ROUTE_1].len(), 3);
    assert!(ctx.notifier.sent().is_empty());
    assert_eq!(ctx.geometry.calls(), 2);
}

#[test]
fn can_commit_nothing_when_buffer_is_empty() {
    let ctx = TestContext::default();
    let mut registry = create_draft_registry(&ctx);

    let result = ctx.coordinator.apply_all(&mut EditBuffer::default(), &mut registry).expect("cannot commit");

    assert!(result.applied.is_empty());
    assert_eq!(ctx.geometry.calls(), 0);
}

#[test]
fn can_keep_staged_edits_when_batch_fails() {
    let ctx = TestContext::default();
    let mut registry = create_draft_registry(&ctx);
    let mut buffer = EditBuffer::default();
    buffer.move_stop(&registry, &ROUTE_1, &ROUTE_2, 0, 0).unwrap();
    ctx.store.set_fail_batch(true);

    let result = ctx.coordinator.apply_all(&mut buffer, &mut registry);

    assert!(matches!(result, Err(CommitError::Persistence(_))));
    assert!(result.unwrap_err().is_retryable());
    assert_eq!(buffer.pending_keys(), vec![ROUTE_1, ROUTE_2]);
    assert_stop_ids!(registry.get(&ROUTE_1).unwrap().stops, ["a0", "a1", "a2"]);
    assert!(registry.get(&ROUTE_2).unwrap().persisted_id.is_none());
    assert_stop_ids!(ctx.document("r1").stops, ["a0", "a1", "a2"]);
    assert_eq!(ctx.store.deleted().len(), 1);
    assert_eq!(ctx.store.inner.size(), 1);
    assert!(ctx.has_message("commit of 2 route(s) has failed"));

    ctx.store.set_fail_batch(false);
    let result = ctx.coordinator.apply_all(&mut buffer, &mut registry).expect("cannot retry commit");

    assert_eq!(result.created.len(), 1);
    assert_eq!(ctx.store.inner.size(), 2);
    assert!(buffer.is_empty());
}

#[test]
fn can_keep_staged_edits_when_create_fails() {
    let ctx = TestContext::default();
    let mut registry = create_draft_registry(&ctx);
    let mut buffer = EditBuffer::default();
    buffer.move_stop(&registry, &ROUTE_1, &ROUTE_2, 0, 0).unwrap();
    ctx.store.set_fail_create(true);

    let result = ctx.coordinator.apply_all(&mut buffer, &mut registry);

    assert!(matches!(result, Err(CommitError::Persistence(_))));
    assert_eq!(buffer.pending_keys(), vec![ROUTE_1, ROUTE_2]);
    assert_stop_ids!(ctx.document("r1").stops, ["a0", "a1", "a2"]);
    assert_eq!(ctx.store.inner.size(), 1);
}

#[test]
fn can_notify_agent_about_changes_in_started_route() {
    let ctx = TestContext::default();
    let mut registry = RouteRegistry::default();
    let route = persisted_route(ROUTE_1, "r1", test_stops("s", 5), RouteStatus::InProgress, Some("agent-1"));
    ctx.persist(&mut registry, route);
    let mut buffer = EditBuffer::default();
    buffer.remove_stop(&registry, &ROUTE_1, 4).unwrap();
    buffer.reorder(&registry, &ROUTE_1, 1, 2).unwrap();

    let result = ctx.coordinator.apply_all(&mut buffer, &mut registry).expect("cannot commit");

    let sent = ctx.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(result.notifications_sent, 1);
    assert_eq!(sent[0].agent_id, "agent-1");
    assert_eq!(sent[0].route_id, "r1");
    assert_eq!(
        sent[0].changes.iter().map(|change| (change.stop_id.as_str(), change.change_type)).collect::<Vec<_>>(),
        vec![("s4", ChangeType::Removed), ("s2", ChangeType::Sequence), ("s1", ChangeType::Sequence)]
    );

    let marked = &result.marked[&ROUTE_1];
    assert_stop_ids!(marked.iter().map(|marked| &marked.stop).collect::<Vec<_>>(), ["s0", "s2", "s1", "s3"]);
    assert_eq!(marked[1].modification.as_ref().and_then(|modification| modification.original_sequence), Some(2));
    assert!(!marked[0].was_modified());
}

#[test]
fn can_skip_notifications_when_disabled() {
    let ctx = TestContext::default();
    let config = Config { commit: Some(CommitConfig { notify_agents: Some(false) }), ..Config::default() };
    let (environment, _) = create_logging_environment();
    let coordinator =
        CommitCoordinator::new(ctx.store.clone(), ctx.geometry.clone(), ctx.notifier.clone(), environment)
            .with_config(&config);
    let mut registry = RouteRegistry::default();
    let route = persisted_route(ROUTE_1, "r1", test_stops("s", 2), RouteStatus::Dispatched, Some("agent-1"));
    ctx.persist(&mut registry, route);
    let mut buffer = EditBuffer::default();
    buffer.reorder(&registry, &ROUTE_1, 0, 1).unwrap();

    let result = coordinator.apply_all(&mut buffer, &mut registry).expect("cannot commit");

    assert_eq!(result.notifications_sent, 0);
    assert!(ctx.notifier.sent().is_empty());
}

#[test]
fn can_commit_when_notification_fails() {
    let ctx = TestContext::new(TestGeometryService::default(), TestNotificationService::failing());
    let mut registry = RouteRegistry::default();
    let route = persisted_route(ROUTE_1, "r1", test_stops("s", 2), RouteStatus::Dispatched, Some("agent-1"));
    ctx.persist(&mut registry, route);
    let mut buffer = EditBuffer::default();
    buffer.reorder(&registry, &ROUTE_1, 0, 1).unwrap();

    let result = ctx.coordinator.apply_all(&mut buffer, &mut registry).expect("cannot commit");

    assert_eq!(result.notification_failures, 1);
    assert_stop_ids!(ctx.document("r1").stops, ["s1", "s0"]);
    assert!(ctx.has_message("cannot notify agent 'agent-1'"));
}

#[test]
fn can_degrade_only_route_with_failed_geometry() {
    let ctx = TestContext::new(TestGeometryService::failing_on("b0"), TestNotificationService::default());
    let mut registry = create_draft_registry(&ctx);
    let mut buffer = EditBuffer::default();
    buffer.move_stop(&registry, &ROUTE_1, &ROUTE_2, 0, 0).unwrap();

    let result = ctx.coordinator.apply_all(&mut buffer, &mut registry).expect("cannot commit");

    assert_eq!(result.geometry_failures, vec![ROUTE_2]);
    assert_eq!(result.created.len(), 1);
    assert!(registry.get(&ROUTE_1).unwrap().geometry.is_some());
    assert!(registry.get(&ROUTE_2).unwrap().geometry.is_none());
    assert!(ctx.has_message("cannot compute geometry of route-2"));
}

#[test]
fn can_clear_geometry_of_emptied_route() {
    let ctx = TestContext::default();
    let mut registry = create_registry(1, 1);
    let old = RouteGeometry { distance_meters: 1., duration: 1., encoded_polyline: "old".to_string() };
    let route = Route {
        geometry: Some(old.clone()),
        ..persisted_route(ROUTE_1, "r1", test_stops("a", 1), RouteStatus::Draft, None)
    };
    ctx.persist(&mut registry, route);
    ctx.store.inner.update_one("r1", RouteUpdate { geometry: Some(Some(old)), ..RouteUpdate::default() }).unwrap();
    let mut buffer = EditBuffer::default();
    buffer.move_stop(&registry, &ROUTE_1, &ROUTE_2, 0, 0).unwrap();

    let result = ctx.coordinator.apply_all(&mut buffer, &mut registry).expect("cannot commit");

    assert!(result.geometry_failures.is_empty());
    let document = ctx.document("r1");
    assert!(document.stops.is_empty());
    assert!(document.geometry.is_none());
    let route = registry.get(&ROUTE_1).unwrap();
    assert!(route.stops.is_empty());
    assert!(route.geometry.is_none());
    assert_eq!(ctx.geometry.calls(), 1);
}

#[test]
fn can_refresh_status_and_agent_from_store() {
    let ctx = TestContext::default();
    let mut registry = RouteRegistry::default();
    ctx.persist(&mut registry, persisted_route(ROUTE_1, "r1", test_stops("s", 3), RouteStatus::Draft, None));
    let update = RouteUpdate {
        status: Some(RouteStatus::InProgress),
        agent_id: Some("agent-1".to_string()),
        ..RouteUpdate::default()
    };
    ctx.store.inner.update_one("r1", update).unwrap();
    let mut buffer = EditBuffer::default();
    buffer.reorder(&registry, &ROUTE_1, 0, 2).unwrap();

    ctx.coordinator.apply_all(&mut buffer, &mut registry).expect("cannot commit");

    let route = registry.get(&ROUTE_1).unwrap();
    assert_stop_ids!(route.stops, ["s1", "s2", "s0"]);
    assert_eq!(route.status, RouteStatus::InProgress);
    assert_eq!(route.agent_id.as_deref(), Some("agent-1"));
    assert_eq!(ctx.notifier.sent().len(), 1);
}

#[test]
fn can_commit_without_duplicates_after_discarding_move_source() {
    let ctx = TestContext::default();
    let mut registry = RouteRegistry::default();
    ctx.persist(&mut registry, persisted_route(ROUTE_1, "r1", test_stops("a", 2), RouteStatus::Draft, None));
    ctx.persist(&mut registry, persisted_route(ROUTE_2, "r2", test_stops("b", 1), RouteStatus::Draft, None));
    let mut buffer = EditBuffer::default();
    buffer.move_stop(&registry, &ROUTE_1, &ROUTE_2, 0, 0).unwrap();

    let discarded = buffer.discard(&registry, &ROUTE_1);
    let result = ctx.coordinator.apply_all(&mut buffer, &mut registry).expect("cannot commit");

    assert_eq!(discarded, vec![ROUTE_1, ROUTE_2]);
    assert!(result.applied.is_empty());
    assert_stop_ids!(ctx.document("r1").stops, ["a0", "a1"]);
    assert_stop_ids!(ctx.document("r2").stops, ["b0"]);
    assert!(buffer.insert_stop(&registry, &ROUTE_1, test_stop("b0", 1., 1.), 0).is_err());
}

#[test]
fn can_refuse_route_completed_in_store() {
    let ctx = TestContext::default();
    let mut registry = RouteRegistry::default();
    let route = persisted_route(ROUTE_1, "r1", test_stops("s", 3), RouteStatus::InProgress, Some("agent-1"));
    ctx.persist(&mut registry, route);
    ctx.store.inner.update_one("r1", RouteUpdate { status: Some(RouteStatus::Completed), ..RouteUpdate::default() }).unwrap();
    let mut buffer = EditBuffer::default();
    buffer.reorder(&registry, &ROUTE_1, 0, 2).unwrap();

    let result = ctx.coordinator.apply_all(&mut buffer, &mut registry);

    assert!(matches!(result, Err(CommitError::Refused { key, .. }) if key == ROUTE_1));
    assert!(buffer.is_pending(&ROUTE_1));
    assert_stop_ids!(ctx.document("r1").stops, ["s0", "s1", "s2"]);
}

#[test]
fn can_link_created_route_to_parent_group() {
    let ctx = TestContext::default();
    let mut registry = RouteRegistry::default();
    let key = registry.add_route(DEFAULT_ORIGIN).unwrap();
    registry.set(&key, |route| route.map(|route| Route { parent_group_id: Some("g1".to_string()), ..route }));
    let mut buffer = EditBuffer::default();
    buffer.insert_stop(&registry, &key, test_stop("n0", 1., 1.), 0).unwrap();

    let result = ctx.coordinator.apply_all(&mut buffer, &mut registry).expect("cannot commit");

    let created_id = result.created[0].1.clone();
    assert_eq!(ctx.store.inner.read_group("g1").map(|group| group.route_ids), Some(vec![created_id.clone()]));
    assert_eq!(ctx.document(&created_id).parent_group_id.as_deref(), Some("g1"));
}

#[test]
fn can_transfer_stop_to_external_route() {
    let ctx = TestContext::default();
    let mut registry = RouteRegistry::default();
    ctx.persist(&mut registry, persisted_route(ROUTE_1, "r1", test_stops("a", 3), RouteStatus::Dispatched, Some("agent-1")));
    let external = RouteKey::External("ext1".to_string());
    ctx.persist(
        &mut registry,
        persisted_route(external.clone(), "ext1", test_stops("e", 1), RouteStatus::InProgress, Some("agent-2")),
    );

    let result = ctx
        .coordinator
        .transfer_to_external(&mut registry, &EditBuffer::default(), &ROUTE_1, 1, &external)
        .expect("cannot transfer");

    assert_eq!(result.applied, vec![ROUTE_1, external.clone()]);
    assert_stop_ids!(ctx.document("r1").stops, ["a0", "a2"]);
    assert_stop_ids!(ctx.document("ext1").stops, ["e0", "a1"]);
    assert_stop_ids!(registry.get(&external).unwrap().stops, ["e0", "a1"]);
    assert_stop_ids!(registry.get(&ROUTE_1).unwrap().stops, ["a0", "a2"]);

    let mut agents = ctx.notifier.sent().into_iter().map(|notification| notification.agent_id).collect::<Vec<_>>();
    agents.sort();
    assert_eq!(agents, vec!["agent-1", "agent-2"]);
}

#[test]
fn can_refuse_invalid_transfer() {
    let ctx = TestContext::default();
    let mut registry = create_draft_registry(&ctx);
    let external = RouteKey::External("ext1".to_string());
    ctx.persist(&mut registry, persisted_route(external.clone(), "ext1", test_stops("a", 1), RouteStatus::Draft, None));
    let mut buffer = EditBuffer::default();

    let already_there = ctx.coordinator.transfer_to_external(&mut registry, &buffer, &ROUTE_1, 0, &external);
    let not_external = ctx.coordinator.transfer_to_external(&mut registry, &buffer, &ROUTE_1, 1, &ROUTE_2);
    let not_persisted = ctx.coordinator.transfer_to_external(&mut registry, &buffer, &ROUTE_2, 0, &external);
    buffer.reorder(&registry, &ROUTE_1, 0, 1).unwrap();
    let pending = ctx.coordinator.transfer_to_external(&mut registry, &buffer, &ROUTE_1, 1, &external);

    assert!(matches!(already_there, Err(CommitError::Refused { key, .. }) if key == external));
    assert!(matches!(not_external, Err(CommitError::Refused { key, .. }) if key == ROUTE_2));
    assert!(matches!(not_persisted, Err(CommitError::Refused { key, .. }) if key == ROUTE_2));
    assert!(matches!(pending, Err(CommitError::Refused { key, .. }) if key == ROUTE_1));
    assert_stop_ids!(ctx.document("ext1").stops, ["a0"]);
}

#[test]
fn can_move_route_through_lifecycle() {
    let ctx = TestContext::default();
    let mut registry = create_draft_registry(&ctx);

    let no_agent = ctx.coordinator.transition_route(&mut registry, &ROUTE_1, DispatchAction::Dispatch, None);
    let start_draft = ctx.coordinator.transition_route(&mut registry, &ROUTE_1, DispatchAction::Start, None);
    let dispatched =
        ctx.coordinator.transition_route(&mut registry, &ROUTE_1, DispatchAction::Dispatch, Some("agent-1".to_string()));
    let started = ctx.coordinator.transition_route(&mut registry, &ROUTE_1, DispatchAction::Start, None);
    let not_persisted = ctx.coordinator.transition_route(&mut registry, &ROUTE_2, DispatchAction::Dispatch, None);

    assert!(matches!(no_agent, Err(CommitError::Refused { .. })));
    assert!(matches!(start_draft, Err(CommitError::Refused { .. })));
    assert_eq!(dispatched, Ok(RouteStatus::Dispatched));
    assert_eq!(started, Ok(RouteStatus::InProgress));
    assert!(matches!(not_persisted, Err(CommitError::Refused { .. })));

    let document = ctx.document("r1");
    assert_eq!(document.status, RouteStatus::InProgress);
    assert_eq!(document.agent_id.as_deref(), Some("agent-1"));
    let route = registry.get(&ROUTE_1).unwrap();
    assert_eq!(route.status, RouteStatus::InProgress);
    assert_eq!(route.agent_id.as_deref(), Some("agent-1"));
}

#[test]
fn can_delete_draft_route_returning_stops_to_pool() {
    let ctx = TestContext::default();
    let mut registry = RouteRegistry::default();
    let route = Route {
        parent_group_id: Some("g1".to_string()),
        ..persisted_route(ROUTE_1, "r1", test_stops("a", 2), RouteStatus::Draft, None)
    };
    ctx.persist(&mut registry, route);
    registry.set(&ROUTE_2, |_| Some(test_route(ROUTE_2, test_stops("b", 1))));
    let buffer = EditBuffer::default();

    let deleted = ctx.coordinator.delete_route(&mut registry, &buffer, &ROUTE_1).expect("cannot delete");
    let local = ctx.coordinator.delete_route(&mut registry, &buffer, &ROUTE_2).expect("cannot delete");

    assert_stop_ids!(deleted, ["a0", "a1"]);
    assert_stop_ids!(local, ["b0"]);
    assert_eq!(ctx.store.inner.read_one("r1"), Ok(None));
    assert_stop_ids!(ctx.store.inner.read_group("g1").unwrap().unassigned_stops, ["a0", "a1"]);
    assert!(registry.keys().is_empty());
    assert_stop_ids!(registry.unassigned(), ["a0", "a1", "b0"]);
}

#[test]
fn can_refuse_deleting_dispatched_or_staged_route() {
    let ctx = TestContext::default();
    let mut registry = create_draft_registry(&ctx);
    registry.set(&ROUTE_2, |route| route.map(|route| Route { status: RouteStatus::Dispatched, ..route }));
    let mut buffer = EditBuffer::default();
    buffer.reorder(&registry, &ROUTE_1, 0, 1).unwrap();

    let staged = ctx.coordinator.delete_route(&mut registry, &buffer, &ROUTE_1);
    let dispatched = ctx.coordinator.delete_route(&mut registry, &buffer, &ROUTE_2);

    assert!(matches!(staged, Err(CommitError::Refused { .. })));
    assert!(matches!(dispatched, Err(CommitError::Refused { .. })));
    assert_eq!(registry.keys().len(), 2);
    assert_eq!(ctx.store.inner.size(), 1);
}

#[test]
fn can_keep_route_and_pool_when_delete_fails() {
    let ctx = TestContext::default();
    let mut registry = RouteRegistry::default();
    let route = Route {
        parent_group_id: Some("g1".to_string()),
        ..persisted_route(ROUTE_1, "r1", test_stops("a", 2), RouteStatus::Draft, None)
    };
    ctx.persist(&mut registry, route);
    ctx.store.set_fail_batch(true);

    let result = ctx.coordinator.delete_route(&mut registry, &EditBuffer::default(), &ROUTE_1);

    assert!(result.is_err_and(|err| err.is_retryable()));
    assert_stop_ids!(ctx.document("r1").stops, ["a0", "a1"]);
    assert!(ctx.store.inner.read_group("g1").is_none());
    assert_stop_ids!(registry.get(&ROUTE_1).unwrap().stops, ["a0", "a1"]);
    assert!(registry.unassigned().is_empty());
    assert!(ctx.has_message("cannot delete route-1"));
}

#[test]
fn can_delete_route_without_group_only_when_empty() {
    let ctx = TestContext::default();
    let mut registry = RouteRegistry::default();
    ctx.persist(&mut registry, persisted_route(ROUTE_1, "r1", test_stops("a", 1), RouteStatus::Draft, None));
    ctx.persist(&mut registry, persisted_route(ROUTE_2, "r2", vec![], RouteStatus::Draft, None));
    let buffer = EditBuffer::default();

    let refused = ctx.coordinator.delete_route(&mut registry, &buffer, &ROUTE_1);
    let deleted = ctx.coordinator.delete_route(&mut registry, &buffer, &ROUTE_2).expect("cannot delete");

    assert!(matches!(refused, Err(CommitError::Refused { key, .. }) if key == ROUTE_1));
    assert_stop_ids!(ctx.document("r1").stops, ["a0"]);
    assert!(deleted.is_empty());
    assert_eq!(ctx.store.inner.read_one("r2"), Ok(None));
    assert_eq!(registry.keys(), vec![ROUTE_1]);
}
