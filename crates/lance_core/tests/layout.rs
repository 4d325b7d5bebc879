use std::sync::mpsc;
use std::sync::Once;

use lance_core::scene::{hit_test, FrameGate, PulseAnimator, Scene, ViewTransform, ZOOM_EXTENT};
use lance_core::{MeshEdge, MeshNode, Point, RunState, Simulation, Topology};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(lance_logging::initialize_for_tests);
}

fn node(id: &str) -> MeshNode {
    MeshNode {
        id: id.to_string(),
        name: id.to_uppercase(),
        ..MeshNode::default()
    }
}

fn triangle() -> (Vec<MeshNode>, Vec<MeshEdge>) {
    (
        vec![node("a"), node("b"), node("c")],
        vec![
            MeshEdge::new("a", "b"),
            MeshEdge::new("b", "c"),
            MeshEdge::new("c", "a"),
        ],
    )
}

#[test]
fn dangling_edges_are_filtered_from_the_snapshot() {
    init_logging();
    let mut topology = Topology::new();
    let dropped = topology.load_snapshot(
        vec![node("x"), node("z"), node("x")],
        vec![MeshEdge::new("x", "y"), MeshEdge::new("x", "z")],
    );

    assert_eq!(dropped, 1);
    assert_eq!(topology.nodes().len(), 2);
    assert!(topology
        .edges()
        .iter()
        .all(|e| e.source != "y" && e.target != "y"));

    let sim = Simulation::start(topology.nodes(), topology.edges(), 800.0, 600.0);
    assert!(sim
        .links()
        .all(|(s, t)| s.id() != "y" && t.id() != "y"));
}

#[test]
fn self_loops_are_not_counted_as_links() {
    init_logging();
    let mut topology = Topology::new();
    let dropped = topology.load_snapshot(
        vec![node("a"), node("b")],
        vec![MeshEdge::new("a", "a"), MeshEdge::new("a", "b")],
    );
    assert_eq!(dropped, 1);
    assert_eq!(topology.edges(), &[MeshEdge::new("a", "b")][..]);
}

#[test]
fn empty_graph_starts_idle() {
    let mut sim = Simulation::start(&[], &[], 800.0, 600.0);
    assert_eq!(sim.run_state(), RunState::Idle);
    assert!(sim.tick().is_none());
}

#[test]
fn simulation_cools_to_idle() {
    init_logging();
    let (nodes, edges) = triangle();
    let mut sim = Simulation::start(&nodes, &edges, 800.0, 600.0);

    let mut ticks = 0;
    while sim.tick().is_some() {
        ticks += 1;
        assert!(ticks < 1_000, "simulation never cooled");
    }

    assert_eq!(sim.run_state(), RunState::Idle);
    assert!(sim.alpha() < sim.settings().alpha_min);
    for n in sim.nodes() {
        assert!(n.position().x.is_finite() && n.position().y.is_finite());
    }
    // Spread apart at least as far as the collision radius.
    let a = sim.node("a").unwrap().position();
    let b = sim.node("b").unwrap().position();
    assert!(a.distance(b) > sim.settings().collision_radius);
}

#[test]
fn restart_preserves_position_and_velocity_of_surviving_nodes() {
    init_logging();
    let (nodes, edges) = triangle();
    let mut sim = Simulation::start(&nodes, &edges, 800.0, 600.0);
    for _ in 0..5 {
        sim.tick();
    }
    let before = sim.node("b").unwrap().clone();
    assert!(before.velocity().x != 0.0 || before.velocity().y != 0.0);
    let old_generation = sim.generation();

    let mut next_nodes = nodes.clone();
    next_nodes.push(node("d"));
    let sim = sim.restart(&next_nodes, &edges, 800.0, 600.0);

    let after = sim.node("b").unwrap();
    assert_eq!(after.position(), before.position());
    assert_eq!(after.velocity(), before.velocity());
    assert!(sim.generation() > old_generation);
    assert_eq!(sim.nodes().len(), 4);
    assert!(sim.is_running());
}

#[test]
fn restart_drops_nodes_missing_from_the_snapshot() {
    let (nodes, edges) = triangle();
    let sim = Simulation::start(&nodes, &edges, 800.0, 600.0);

    let sim = sim.restart(&nodes[..2], &edges, 800.0, 600.0);

    assert!(sim.node("c").is_none());
    assert_eq!(sim.links().count(), 1);
}

#[test]
fn pin_holds_a_node_and_unpin_returns_it_to_the_forces() {
    init_logging();
    let (nodes, edges) = triangle();
    let mut sim = Simulation::start(&nodes, &edges, 800.0, 600.0);
    while sim.tick().is_some() {}
    assert_eq!(sim.run_state(), RunState::Idle);

    assert!(sim.pin("a", 50.0, 60.0));
    assert!(sim.is_running());
    for _ in 0..10 {
        sim.tick();
    }
    let a = sim.node("a").unwrap();
    assert_eq!(a.position(), Point::new(50.0, 60.0));
    assert_eq!(a.pinned(), Some(Point::new(50.0, 60.0)));

    assert!(sim.unpin("a"));
    assert_eq!(sim.node("a").unwrap().pinned(), None);
    sim.tick();
    assert!(sim.node("a").unwrap().position() != Point::new(50.0, 60.0));
}

#[test]
fn pin_ignores_unknown_ids_and_stopped_simulations() {
    let (nodes, edges) = triangle();
    let mut sim = Simulation::start(&nodes, &edges, 800.0, 600.0);
    assert!(!sim.pin("zz", 0.0, 0.0));
    assert!(!sim.unpin("a"));

    sim.stop();
    sim.stop();
    assert_eq!(sim.run_state(), RunState::Stopped);
    assert!(!sim.pin("a", 0.0, 0.0));
    assert!(sim.tick().is_none());
}

#[test]
fn listeners_receive_frames_until_stop() {
    let (nodes, edges) = triangle();
    let mut sim = Simulation::start(&nodes, &edges, 800.0, 600.0);
    let (tx, rx) = mpsc::channel();
    sim.on_tick(move |frame| {
        let _ = tx.send(frame.clone());
    });

    sim.tick();
    sim.tick();
    sim.stop();
    sim.tick();

    let frames: Vec<_> = rx.try_iter().collect();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[1].tick, 2);
    assert!(frames.iter().all(|f| f.generation == sim.generation()));
    assert_eq!(frames[0].positions.len(), 3);
}

#[test]
fn frame_gate_rejects_frames_from_a_replaced_simulation() {
    let (nodes, edges) = triangle();
    let mut old = Simulation::start(&nodes, &edges, 800.0, 600.0);
    let stale = old.tick().unwrap();
    let mut next = old.restart(&nodes, &edges, 1024.0, 768.0);
    let fresh = next.tick().unwrap();

    let mut gate = FrameGate::default();
    gate.bind(next.generation());
    assert!(!gate.accepts(&stale));
    assert!(gate.accepts(&fresh));

    gate.unbind();
    assert!(!gate.accepts(&fresh));
}

#[test]
fn zoom_and_pan_leave_the_simulation_untouched() {
    let (nodes, edges) = triangle();
    let sim = Simulation::start(&nodes, &edges, 800.0, 600.0);
    let positions: Vec<Point> = sim.nodes().iter().map(|n| n.position()).collect();

    let mut transform = ViewTransform::IDENTITY;
    transform.zoom_at(Point::new(400.0, 300.0), 2.0);
    transform.pan(15.0, -5.0);
    let scene = Scene::build(&sim, &transform, 0.0);

    let after: Vec<Point> = sim.nodes().iter().map(|n| n.position()).collect();
    assert_eq!(after, positions);
    let expected = transform.apply(positions[0]);
    assert_eq!(scene.nodes[0].center, expected);
    assert_eq!(scene.edges.len(), 3);
}

#[test]
fn zoom_is_clamped_and_keeps_the_anchor_fixed() {
    let mut transform = ViewTransform::IDENTITY;
    let anchor = Point::new(120.0, 80.0);
    let sim_point = transform.invert(anchor);

    transform.zoom_at(anchor, 100.0);
    assert_eq!(transform.k, ZOOM_EXTENT.1);
    let moved = transform.apply(sim_point);
    assert!((moved.x - anchor.x).abs() < 1e-9 && (moved.y - anchor.y).abs() < 1e-9);

    transform.zoom_at(anchor, 0.0001);
    assert_eq!(transform.k, ZOOM_EXTENT.0);
}

#[test]
fn hit_test_follows_the_view_transform() {
    let (nodes, edges) = triangle();
    let mut sim = Simulation::start(&nodes, &edges, 800.0, 600.0);
    while sim.tick().is_some() {}
    let mut transform = ViewTransform::IDENTITY;
    transform.pan(200.0, 0.0);

    let target = sim.node("b").unwrap().position();
    let on_screen = transform.apply(target);

    assert_eq!(hit_test(&sim, &transform, on_screen).as_deref(), Some("b"));
    assert_eq!(hit_test(&sim, &transform, target), None);
}

#[test]
fn pulse_rises_then_fades() {
    use std::time::Duration;

    let mut pulse = PulseAnimator::default();
    assert_eq!(pulse.intensity(Duration::ZERO), 0.0);

    let start = Duration::from_secs(10);
    pulse.trigger(start);
    assert!((pulse.intensity(start + Duration::from_millis(150)) - 0.5).abs() < 1e-9);
    assert!((pulse.intensity(start + Duration::from_millis(300)) - 1.0).abs() < 1e-9);
    assert!((pulse.intensity(start + Duration::from_millis(600)) - 0.5).abs() < 1e-9);
    assert_eq!(pulse.intensity(start + Duration::from_millis(900)), 0.0);
    assert!(!pulse.is_animating(start + Duration::from_millis(900)));
}
