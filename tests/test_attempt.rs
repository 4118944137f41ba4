use std::sync::Arc;
use std::time::{Duration, Instant};
use attempt_scheduler::attempt::SchedulerApplicationAttempt;
use attempt_scheduler::container::{exit_status, ApplicationAttemptId, ApplicationId, Container, ContainerId,
                                   ContainerStatus, NodeId, Priority};
use attempt_scheduler::container_allocator::{AssignmentKind, ResourceLimits, SchedulingMode};
use attempt_scheduler::default_container_allocators::regular_allocator::RegularContainerAllocator;
use attempt_scheduler::default_resource_calculators::default_calculator::DefaultResourceCalculator;
use attempt_scheduler::error::{SchedulerError, UsageKind};
use attempt_scheduler::headroom_provider::FixedHeadroomProvider;
use attempt_scheduler::node::{SchedulerNode, NO_LABEL};
use attempt_scheduler::queue_metrics::QueueMetrics;
use attempt_scheduler::resource::Resource;
use attempt_scheduler::resource_request::{Location, NodeType, ResourceRequest};
use attempt_scheduler::rm_container::{RMContainer, RMContainerEventType, RMContainerState};
use attempt_scheduler::scheduler_config::SchedulerConfig;

fn get_attempt_id(app: u32, attempt: u32) -> ApplicationAttemptId {
    ApplicationAttemptId::new(ApplicationId::new(1_700_000_000_000, app), attempt)
}

fn get_attempt(app: u32) -> SchedulerApplicationAttempt {
    SchedulerApplicationAttempt::new(get_attempt_id(app, 1), "alice", Arc::new(SchedulerConfig::default()),
                                     Arc::new(QueueMetrics::new("root.default")),
                                     Box::new(RegularContainerAllocator::with_cluster_size(10)))
}

fn get_node(host: &str) -> Arc<SchedulerNode> {
    Arc::new(SchedulerNode::new(NodeId::new(host, 8041), "/default-rack", Resource::new(8192, 8)))
}

fn get_container(attempt: &SchedulerApplicationAttempt, id: u64, node: &SchedulerNode, memory_mb: u64,
                 priority: i32) -> Container {
    Container::new(ContainerId::new(attempt.attempt_id(), id), node.node_id().clone(),
                   Resource::new(memory_mb, 1), Priority(priority))
}

fn ask(attempt: &SchedulerApplicationAttempt, priority: i32, memory_mb: u64, containers: u32) -> ResourceRequest {
    let request = ResourceRequest::any(Priority(priority), Resource::new(memory_mb, 1), containers);
    attempt.update_resource_requests(vec![request.clone()]);
    request
}

fn live_sum(attempt: &SchedulerApplicationAttempt) -> Resource {
    attempt.live_containers().iter().map(|c| c.allocated_resource()).sum()
}

fn cluster() -> Resource {
    Resource::new(81920, 80)
}

#[test]
fn test_allocate_and_complete() {
    let attempt = get_attempt(1);
    let node = get_node("host1");
    let request = ask(&attempt, 1, 1024, 2);
    let container = get_container(&attempt, 1, &node, 1024, 1);
    let container_id = container.id;

    let rm_container = attempt.allocate(NodeType::OffSwitch, &node, Priority(1), &request, container)
        .unwrap()
        .unwrap();
    assert_eq!(rm_container.state(), RMContainerState::Allocated);
    assert_eq!(attempt.current_consumption(), Resource::new(1024, 1));
    assert_eq!(attempt.live_containers().len(), 1);
    assert_eq!(attempt.lock().request_book().total_required_containers(Priority(1)), 1);
    assert_eq!(rm_container.resource_requests().len(), 1);

    attempt.add_preempt_container(container_id);
    assert!(attempt.lock().containers_to_preempt().contains(&container_id));

    let status = ContainerStatus::completed(container_id, exit_status::SUCCESS);
    assert!(attempt.container_completed(&rm_container, status.clone(), RMContainerEventType::Finished,
                                        NO_LABEL).unwrap());
    assert_eq!(attempt.current_consumption(), Resource::ZERO);
    assert!(attempt.lock().containers_to_preempt().is_empty());
    assert_eq!(rm_container.state(), RMContainerState::Completed);
    assert_eq!(rm_container.finished_status(), Some(status.clone()));

    // Duplicate notification from a retried heartbeat.
    assert!(!attempt.container_completed(&rm_container, status, RMContainerEventType::Finished,
                                         NO_LABEL).unwrap());
    assert_eq!(attempt.current_consumption(), Resource::ZERO);

    let metrics = attempt.metrics().snapshot();
    assert_eq!(metrics.aggregate_containers_allocated, 1);
    assert_eq!(metrics.aggregate_containers_released, 1);
    assert_eq!(metrics.allocated_containers, 0);
}

#[test]
fn test_allocate_without_pending_requests() {
    let attempt = get_attempt(1);
    let node = get_node("host1");
    let request = ask(&attempt, 1, 1024, 1);

    let container = get_container(&attempt, 1, &node, 1024, 5);
    let result = attempt.allocate(NodeType::OffSwitch, &node, Priority(5), &request, container).unwrap();
    assert!(result.is_none());
    assert!(attempt.live_containers().is_empty());
    assert_eq!(attempt.current_consumption(), Resource::ZERO);
}

#[test]
fn test_allocate_after_request_withdrawn() {
    let attempt = get_attempt(1);
    let node = get_node("host1");
    let request = ask(&attempt, 1, 1024, 1);
    ask(&attempt, 1, 1024, 0);

    let container = get_container(&attempt, 1, &node, 1024, 1);
    assert!(attempt.allocate(NodeType::OffSwitch, &node, Priority(1), &request, container).unwrap().is_none());
    assert!(attempt.live_containers().is_empty());
}

#[test]
fn test_allocate_duplicate_container() {
    let attempt = get_attempt(1);
    let node = get_node("host1");
    let request = ask(&attempt, 1, 1024, 2);
    let container = get_container(&attempt, 1, &node, 1024, 1);

    attempt.allocate(NodeType::OffSwitch, &node, Priority(1), &request, container.clone()).unwrap();
    let result = attempt.allocate(NodeType::OffSwitch, &node, Priority(1), &request, container);
    assert!(matches!(result, Err(SchedulerError::DuplicateContainer(_))));
    assert_eq!(attempt.live_containers().len(), 1);
    assert_eq!(attempt.current_consumption(), live_sum(&attempt));
}

#[test]
fn test_update_requests_replaces() {
    let attempt = get_attempt(1);
    ask(&attempt, 1, 1024, 2);
    ask(&attempt, 1, 1024, 5);
    assert_eq!(attempt.lock().request_book().total_required_containers(Priority(1)), 5);
    assert_eq!(attempt.lock().request_book().total_pending(Priority(1)), Resource::new(5120, 5));
}

#[test]
fn test_total_pending_requests_counts_any_only() {
    let attempt = get_attempt(1);
    attempt.update_resource_requests(vec![
        ResourceRequest::any(Priority(1), Resource::new(1024, 1), 2),
        ResourceRequest::new(Priority(1), Location::Node("host1".to_string()), Resource::new(1024, 1), 2),
        ResourceRequest::new(Priority(1), Location::Rack("/default-rack".to_string()), Resource::new(1024, 1), 2),
        ResourceRequest::any(Priority(2), Resource::new(2048, 1), 1),
    ]);
    assert_eq!(attempt.total_pending_requests(), Resource::new(4096, 3));
}

#[test]
fn test_node_local_allocation_consumes_all_levels() {
    let attempt = get_attempt(1);
    let node = get_node("host1");
    let capability = Resource::new(1024, 1);
    let request = ResourceRequest::new(Priority(1), Location::Node("host1".to_string()), capability, 1);
    attempt.update_resource_requests(vec![
        ResourceRequest::any(Priority(1), capability, 2),
        ResourceRequest::new(Priority(1), Location::Rack("/default-rack".to_string()), capability, 1),
        request.clone(),
    ]);

    let container = get_container(&attempt, 1, &node, 1024, 1);
    let rm_container = attempt.allocate(NodeType::NodeLocal, &node, Priority(1), &request, container)
        .unwrap()
        .unwrap();
    assert_eq!(rm_container.resource_requests().len(), 3);

    let guard = attempt.lock();
    let book = guard.request_book();
    assert_eq!(book.total_required_containers(Priority(1)), 1);
    assert_eq!(book.get(Priority(1), &Location::Node("host1".to_string())).unwrap().num_containers, 0);
    assert_eq!(book.get(Priority(1), &Location::Rack("/default-rack".to_string())).unwrap().num_containers, 0);
}

#[test]
fn test_get_allocation_drains_once() {
    let attempt = get_attempt(1);
    let node = get_node("host1");
    let request = ask(&attempt, 1, 1024, 2);
    for id in 1..=2 {
        let container = get_container(&attempt, id, &node, 1024, 1);
        attempt.allocate(NodeType::OffSwitch, &node, Priority(1), &request, container).unwrap();
    }
    let calculator = DefaultResourceCalculator::new();
    let minimum = Resource::new(1024, 1);

    let first = attempt.get_allocation(&calculator, &cluster(), &minimum);
    assert_eq!(first.containers.len(), 2);
    assert!(first.preempted_container_ids.is_empty());
    for rm_container in attempt.live_containers() {
        assert_eq!(rm_container.state(), RMContainerState::Acquired);
    }

    let second = attempt.get_allocation(&calculator, &cluster(), &minimum);
    assert!(second.containers.is_empty());
    assert!(second.preempted_container_ids.is_empty());
    assert_eq!(second.resource_requests[0].num_containers, 0);
}

#[test]
fn test_get_allocation_preemption_hint() {
    let attempt = get_attempt(1);
    let node = get_node("host1");
    let request = ask(&attempt, 1, 1024, 2);
    let small = get_container(&attempt, 1, &node, 1024, 1);
    let large = get_container(&attempt, 2, &node, 2048, 1);
    let (small_id, large_id) = (small.id, large.id);
    attempt.allocate(NodeType::OffSwitch, &node, Priority(1), &request, small).unwrap();
    attempt.allocate(NodeType::OffSwitch, &node, Priority(1), &request, large).unwrap();

    attempt.add_preempt_container(small_id);
    attempt.add_preempt_container(large_id);
    // Not live, ignored.
    attempt.add_preempt_container(ContainerId::new(attempt.attempt_id(), 99));

    let calculator = DefaultResourceCalculator::new();
    let allocation = attempt.get_allocation(&calculator, &cluster(), &Resource::new(1024, 1));
    assert_eq!(allocation.preempted_container_ids.len(), 2);
    assert!(allocation.preempted_container_ids.contains(&small_id));
    assert!(allocation.preempted_container_ids.contains(&large_id));
    assert_eq!(allocation.resource_requests.len(), 1);
    let hint = &allocation.resource_requests[0];
    assert_eq!(hint.num_containers, 3);
    assert_eq!(hint.priority, Priority::UNDEFINED);
    assert_eq!(hint.location, Location::Any);

    let again = attempt.get_allocation(&calculator, &cluster(), &Resource::new(1024, 1));
    assert!(again.preempted_container_ids.is_empty());
}

#[test]
fn test_locality_wait_factor() {
    let attempt = get_attempt(1);
    let capability = Resource::new(1024, 1);
    attempt.update_resource_requests((1..=3).map(|i| {
        ResourceRequest::new(Priority(2), Location::Node(format!("host{}", i)), capability, 1)
    }).collect());
    assert_eq!(attempt.locality_wait_factor(Priority(2), 10), 0.2);
    assert_eq!(attempt.locality_wait_factor(Priority(2), 1), 1.0);
    assert_eq!(attempt.locality_wait_factor(Priority(2), 0), 1.0);

    ask(&attempt, 3, 1024, 1);
    assert_eq!(attempt.locality_wait_factor(Priority(3), 10), 0.0);
    assert_eq!(attempt.locality_wait_factor(Priority(7), 10), 0.0);
}

#[test]
fn test_stop() {
    let attempt = get_attempt(1);
    let node = get_node("host1");
    let request = ask(&attempt, 1, 1024, 3);
    let container = get_container(&attempt, 1, &node, 1024, 1);
    let rm_container = attempt.allocate(NodeType::OffSwitch, &node, Priority(1), &request, container)
        .unwrap()
        .unwrap();

    attempt.stop();
    assert!(attempt.is_stopped());
    let late = get_container(&attempt, 2, &node, 1024, 1);
    assert!(attempt.allocate(NodeType::OffSwitch, &node, Priority(1), &request, late.clone()).unwrap().is_none());
    assert!(matches!(attempt.reserve(Priority(1), &node, None, late),
                     Err(SchedulerError::AttemptStopped(_))));

    let limits = ResourceLimits::new(cluster());
    let assignment = attempt.assign_containers(&cluster(), &node, &limits,
                                               SchedulingMode::RespectPartitionExclusivity, None).unwrap();
    assert_eq!(assignment.kind, AssignmentKind::Nothing);

    let status = ContainerStatus::completed(rm_container.container_id(), exit_status::ABORTED);
    assert!(attempt.container_completed(&rm_container, status, RMContainerEventType::Kill, NO_LABEL).unwrap());
    assert_eq!(rm_container.state(), RMContainerState::Killed);
    assert_eq!(attempt.current_consumption(), Resource::ZERO);
}

#[test]
fn test_headroom() {
    let attempt = get_attempt(1);
    attempt.set_headroom(Resource::new(4096, 4));
    assert_eq!(attempt.headroom(), Resource::new(4096, 4));

    let provider = Arc::new(FixedHeadroomProvider::new(Resource::new(2048, 2)));
    attempt.set_headroom_provider(Some(provider.clone()));
    assert_eq!(attempt.headroom(), Resource::new(2048, 2));
    provider.set(Resource::new(1024, 1));
    assert_eq!(attempt.headroom(), Resource::new(1024, 1));

    let allocation = attempt.get_allocation(&DefaultResourceCalculator::new(), &cluster(), &Resource::new(1024, 1));
    assert_eq!(allocation.headroom, Resource::new(1024, 1));
    assert_eq!(attempt.metrics().snapshot().available_to_user.get("alice"), Some(&Resource::new(1024, 1)));

    attempt.set_headroom_provider(None);
    assert_eq!(attempt.headroom(), Resource::new(4096, 4));
}

#[test]
fn test_completion_on_wrong_partition_is_rejected() {
    let attempt = get_attempt(1);
    let node = get_node("host1");
    let request = ask(&attempt, 1, 1024, 1);
    let container = get_container(&attempt, 1, &node, 1024, 1);
    let rm_container = attempt.allocate(NodeType::OffSwitch, &node, Priority(1), &request, container)
        .unwrap()
        .unwrap();

    let status = ContainerStatus::completed(rm_container.container_id(), exit_status::SUCCESS);
    let result = attempt.container_completed(&rm_container, status, RMContainerEventType::Finished, "gpu");
    match result {
        Err(SchedulerError::AccountingViolation { partition, kind, .. }) => {
            assert_eq!(partition, "gpu");
            assert_eq!(kind, UsageKind::Used);
        }
        other => panic!("unexpected result {:?}", other),
    }
    assert_eq!(attempt.live_containers().len(), 1);
    assert_eq!(attempt.current_consumption(), Resource::new(1024, 1));
    assert_eq!(rm_container.state(), RMContainerState::Allocated);
}

#[test]
fn test_recover_container() {
    let attempt = get_attempt(1);
    let node = get_node("host1");
    let container = get_container(&attempt, 7, &node, 2048, 1);
    let rm_container = Arc::new(RMContainer::new(container, attempt.attempt_id(), NO_LABEL));
    rm_container.handle(RMContainerEventType::Start).unwrap();

    attempt.recover_container(rm_container.clone(), NO_LABEL).unwrap();
    assert_eq!(attempt.live_containers().len(), 1);
    assert_eq!(attempt.current_consumption(), Resource::new(2048, 1));
    assert!(attempt.lock().request_book().is_empty());
    assert!(matches!(attempt.recover_container(rm_container, NO_LABEL),
                     Err(SchedulerError::DuplicateContainer(_))));
    assert_eq!(attempt.lock().new_container_id().id, 8);

    let finished = Arc::new(RMContainer::new(get_container(&attempt, 9, &node, 1024, 1), attempt.attempt_id(),
                                             NO_LABEL));
    finished.handle(RMContainerEventType::Kill).unwrap();
    attempt.recover_container(finished, NO_LABEL).unwrap();
    assert_eq!(attempt.live_containers().len(), 1);
}

#[test]
fn test_node_partition_updated() {
    let attempt = get_attempt(1);
    let node = get_node("host1");
    let request = ask(&attempt, 1, 1024, 1);
    let container = get_container(&attempt, 1, &node, 1024, 1);
    let rm_container = attempt.allocate(NodeType::OffSwitch, &node, Priority(1), &request, container)
        .unwrap()
        .unwrap();

    attempt.node_partition_updated(&rm_container, NO_LABEL, "gpu").unwrap();
    assert_eq!(attempt.lock().used(NO_LABEL), Resource::ZERO);
    assert_eq!(attempt.lock().used("gpu"), Resource::new(1024, 1));
    assert_eq!(attempt.current_consumption(), Resource::new(1024, 1));

    let status = ContainerStatus::completed(rm_container.container_id(), exit_status::SUCCESS);
    assert!(attempt.container_completed(&rm_container, status, RMContainerEventType::Finished, "gpu").unwrap());
    assert_eq!(attempt.current_consumption(), Resource::ZERO);
}

#[test]
fn test_transfer_state_from_previous_attempt() {
    let previous = get_attempt(1);
    let node = get_node("host1");
    let request = ask(&previous, 1, 1024, 3);
    let container = get_container(&previous, 1, &node, 1024, 1);
    previous.allocate(NodeType::OffSwitch, &node, Priority(1), &request, container).unwrap();
    previous.set_headroom(Resource::new(4096, 4));

    let current = SchedulerApplicationAttempt::new(get_attempt_id(1, 2), "alice",
                                                   Arc::new(SchedulerConfig::default()),
                                                   previous.metrics().clone(),
                                                   Box::new(RegularContainerAllocator::with_cluster_size(10)));
    current.transfer_state_from_previous_attempt(&previous);

    assert_eq!(current.live_containers().len(), 1);
    assert_eq!(current.current_consumption(), Resource::new(1024, 1));
    assert_eq!(current.headroom(), Resource::new(4096, 4));
    assert_eq!(current.lock().request_book().total_required_containers(Priority(1)), 2);
    assert!(previous.lock().request_book().is_empty());

    // Both attempts still agree with their own container indices.
    assert_eq!(previous.live_containers().len(), 1);
    assert_eq!(previous.current_consumption(), live_sum(&previous));
    assert_eq!(current.current_consumption(), live_sum(&current));

    // Completing on the new attempt leaves the old one untouched.
    let rm_container = current.live_containers().remove(0);
    let status = ContainerStatus::completed(rm_container.container_id(), exit_status::SUCCESS);
    assert!(current.container_completed(&rm_container, status, RMContainerEventType::Finished, NO_LABEL).unwrap());
    assert_eq!(current.current_consumption(), Resource::ZERO);
    assert_eq!(current.current_consumption(), live_sum(&current));
    assert_eq!(previous.current_consumption(), live_sum(&previous));
}

#[test]
fn test_resource_usage_report() {
    let attempt = get_attempt(1);
    let node = get_node("host1");
    let request = ask(&attempt, 1, 2048, 2);
    let container = get_container(&attempt, 1, &node, 2048, 1);
    let rm_container = attempt.allocate(NodeType::OffSwitch, &node, Priority(1), &request, container)
        .unwrap()
        .unwrap();
    attempt.reserve(Priority(1), &get_node("host2"), None, get_container(&attempt, 2, &node, 1024, 1)).unwrap();

    let now = Instant::now() + Duration::from_secs(10);
    let report = attempt.resource_usage_report(now);
    assert_eq!(report.num_used_containers, 1);
    assert_eq!(report.num_reserved_containers, 1);
    assert_eq!(report.used, Resource::new(2048, 1));
    assert_eq!(report.reserved, Resource::new(1024, 1));
    assert_eq!(report.needed, Resource::new(3072, 2));
    assert!(report.memory_seconds >= 20480 && report.memory_seconds < 20480 + 2048);
    assert!(report.vcore_seconds >= 10 && report.vcore_seconds < 12);

    // Served from the cache.
    let cached = attempt.resource_usage_report(now + Duration::from_secs(1));
    assert_eq!(cached.memory_seconds, report.memory_seconds);

    let status = ContainerStatus::completed(rm_container.container_id(), exit_status::SUCCESS);
    attempt.container_completed(&rm_container, status, RMContainerEventType::Finished, NO_LABEL).unwrap();
    let recomputed = attempt.resource_usage_report(now + Duration::from_secs(1));
    assert_eq!(recomputed.memory_seconds, 0);
    assert_eq!(recomputed.num_used_containers, 0);
}

#[test]
fn test_metrics_json() {
    let attempt = get_attempt(1);
    let node = get_node("host1");
    let request = ask(&attempt, 1, 1024, 1);
    attempt.allocate(NodeType::OffSwitch, &node, Priority(1), &request, get_container(&attempt, 1, &node, 1024, 1))
        .unwrap();

    let json = attempt.metrics().to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["allocated_containers"], 1);
    assert_eq!(value["allocated"]["memory_mb"], 1024);
}

#[test]
fn test_kill_before_pull_restores_demand() {
    let attempt = get_attempt(1);
    let node = get_node("host1");
    let request = ask(&attempt, 1, 1024, 2);
    let first = attempt.allocate(NodeType::OffSwitch, &node, Priority(1), &request,
                                 get_container(&attempt, 1, &node, 1024, 1)).unwrap().unwrap();
    assert_eq!(attempt.lock().request_book().total_required_containers(Priority(1)), 1);

    let status = ContainerStatus::completed(first.container_id(), exit_status::KILLED_BY_RESOURCEMANAGER);
    attempt.container_completed(&first, status, RMContainerEventType::Kill, NO_LABEL).unwrap();
    assert_eq!(attempt.lock().request_book().total_required_containers(Priority(1)), 2);

    // Once pulled, the application master owns the outcome.
    let second = attempt.allocate(NodeType::OffSwitch, &node, Priority(1), &request,
                                  get_container(&attempt, 2, &node, 1024, 1)).unwrap().unwrap();
    let allocation = attempt.get_allocation(&DefaultResourceCalculator::new(), &cluster(), &Resource::new(1024, 1));
    assert_eq!(allocation.containers.len(), 1);
    let status = ContainerStatus::completed(second.container_id(), exit_status::KILLED_BY_RESOURCEMANAGER);
    attempt.container_completed(&second, status, RMContainerEventType::Kill, NO_LABEL).unwrap();
    assert_eq!(attempt.lock().request_book().total_required_containers(Priority(1)), 1);
}

#[test]
fn test_metrics_save() {
    let attempt = get_attempt(1);
    let node = get_node("host1");
    attempt.reserve(Priority(1), &node, None, get_container(&attempt, 1, &node, 2048, 1)).unwrap();

    let path = std::env::temp_dir().join(format!("attempt-scheduler-metrics-{}.json", std::process::id()));
    let path = path.to_str().unwrap().to_string();
    attempt.metrics().save(&path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(value["reserved_containers"], 1);
    assert_eq!(value["reserved"]["memory_mb"], 2048);
    std::fs::remove_file(&path).unwrap();
}
