use kickcan_core::{Authority, ConfigError, Payload, SimConfig};
use kickcan_protocol::{
    ActionState, AgentGoal, Command, Event, TriggerEvent, Vec3, VolumeTag,
};

fn config() -> SimConfig {
    SimConfig {
        avatar_spawn: Vec3::new(0.0, 0.0, -1.0),
        ..SimConfig::default()
    }
}

fn tick_events(authority: &mut Authority) -> Vec<Event> {
    authority
        .tick()
        .envelopes
        .into_iter()
        .filter_map(|envelope| match envelope.payload {
            Payload::Event(event) => Some(event),
            Payload::Cue(_) => None,
        })
        .collect()
}

#[test]
fn no_tracked_avatars_means_idle_in_place() {
    let mut authority = Authority::new(config()).unwrap();
    let agent = authority.agents().next().unwrap();
    let home = authority.entity(agent).unwrap().transform;

    for _ in 0..30 {
        let events = tick_events(&mut authority);
        assert!(!events
            .iter()
            .any(|e| matches!(e, Event::AgentGoalChanged { .. })));
    }
    assert_eq!(authority.agent_goal(agent), Some(AgentGoal::Idle));
    assert_eq!(authority.state_of(agent), Some(ActionState::Idle));
    assert_eq!(authority.entity(agent).unwrap().transform, home);
}

#[test]
fn all_tracked_avatars_safe_sends_the_agent_home() {
    let mut authority = Authority::new(config()).unwrap();
    let agent = authority.agents().next().unwrap();
    authority.spawn_avatar("a");

    let events = tick_events(&mut authority);
    assert!(events.contains(&Event::AgentGoalChanged {
        agent,
        goal: AgentGoal::ReturnToBase
    }));
    assert_eq!(authority.agent_goal(agent), Some(AgentGoal::ReturnToBase));
}

#[test]
fn exposed_avatar_mid_pickup_is_pursued() {
    let mut authority = Authority::new(config()).unwrap();
    let agent = authority.agents().next().unwrap();
    let a = authority.spawn_avatar("a");
    authority.tick();
    let start = authority.entity(agent).unwrap().transform.position;

    authority.report_trigger(TriggerEvent::exit(a, VolumeTag::SafeZone));
    authority.submit(a, Command::pickup()).unwrap();
    let events = tick_events(&mut authority);
    assert!(events.contains(&Event::AgentGoalChanged {
        agent,
        goal: AgentGoal::Pursue
    }));
    assert_eq!(authority.state_of(agent), Some(ActionState::Run));

    for _ in 0..10 {
        authority.tick();
    }
    let avatar = authority.entity(a).unwrap().transform.position;
    let now = authority.entity(agent).unwrap().transform.position;
    assert!(now.horizontal_distance(avatar) < start.horizontal_distance(avatar));
}

#[test]
fn exposed_avatars_not_picking_up_leave_the_agent_idle() {
    let mut authority = Authority::new(config()).unwrap();
    let agent = authority.agents().next().unwrap();
    let a = authority.spawn_avatar("a");
    authority.report_trigger(TriggerEvent::exit(a, VolumeTag::SafeZone));
    authority.tick();
    assert_eq!(authority.agent_goal(agent), Some(AgentGoal::Idle));
}

#[test]
fn late_joiners_are_tracked_from_the_next_refresh() {
    let mut authority = Authority::new(config()).unwrap();
    let agent = authority.agents().next().unwrap();
    authority.tick();

    authority.spawn_avatar("late");
    let refresh = authority
        .config()
        .ticks(authority.config().agent.target_refresh_interval);
    while authority.current_tick() < refresh {
        authority.tick();
        assert_eq!(authority.agent_goal(agent), Some(AgentGoal::Idle));
    }
    authority.tick();
    assert_eq!(authority.agent_goal(agent), Some(AgentGoal::ReturnToBase));
}

#[test]
fn agent_fetches_a_thrown_item_and_puts_it_back() {
    let mut authority = Authority::new(config()).unwrap();
    let agent = authority.agents().next().unwrap();
    let a = authority.spawn_avatar("a");
    authority.tick();

    authority.submit(a, Command::pickup()).unwrap();
    authority.tick();
    for _ in 0..60 {
        authority.tick();
    }
    authority.submit(a, Command::throw()).unwrap();

    let mut log = Vec::new();
    for _ in 0..600 {
        log.extend(tick_events(&mut authority));
    }

    let goals: Vec<AgentGoal> = log
        .iter()
        .filter_map(|e| match e {
            Event::AgentGoalChanged { goal, .. } => Some(*goal),
            _ => None,
        })
        .collect();
    assert_eq!(
        goals,
        vec![
            AgentGoal::AcquireItem,
            AgentGoal::DeliverItem,
            AgentGoal::ReturnToBase
        ]
    );
    assert!(log
        .iter()
        .any(|e| matches!(e, Event::ItemPickedUp { holder, .. } if *holder == agent)));
    assert!(log
        .iter()
        .any(|e| matches!(e, Event::ItemDelivered { by, .. } if *by == agent)));
    assert!(log.iter().any(|e| matches!(
        e,
        Event::StateChanged {
            new: ActionState::PutItem,
            ..
        }
    )));

    let status = authority.item_status();
    assert!(status.positioned);
    assert_eq!(status.holder, None);
    assert!(status.position.horizontal_distance(authority.config().item_spawn) < 1e-5);

    let base = authority.config().agent.base_position;
    let stopping = authority.config().agent.stopping_distance;
    let position = authority.entity(agent).unwrap().transform.position;
    assert!(position.horizontal_distance(base) <= stopping + 1e-2);
    // The thrower's score came from a slot pickup; agents never score.
    assert_eq!(authority.entity(a).unwrap().score, 1);
    assert_eq!(authority.entity(agent).unwrap().score, 0);
}

#[test]
fn session_refuses_agents_that_stop_out_of_reach() {
    let mut config = config();
    config.agent.stopping_distance = 3.5;
    config.agent.base_position = Vec3::new(0.0, 0.0, 20.0);
    assert!(matches!(
        Authority::new(config),
        Err(ConfigError::StopOutsidePickupRange { .. })
    ));
}
