//! JSON scene scripts: a list of objects plus editor commands replayed
//! against a fresh [`TrackerAnimator`].

use std::collections::BTreeMap;

use motion_stage_core::animator::TweenOptions;
use motion_stage_core::timeline::{AnimationId, MoveDirection, StepSummary};
use motion_stage_core::{
    Axis, ConnectOutcome, ObjectKind, PlaybackConfig, PointStaging, Result,
    SceneObject, SceneObjects, StageError, TrackerAnimator, TrackerNetwork,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Script {
    pub objects: Vec<ObjectSpec>,
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectSpec {
    pub id: String,
    pub kind: ObjectKind,
}

fn default_binding() -> String {
    "value".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    CreateTracker {
        id: String,
        #[serde(default)]
        value: f64,
    },
    CreatePoint {
        id: String,
        #[serde(default)]
        x: f64,
        #[serde(default)]
        y: f64,
    },
    AddObject(ObjectSpec),
    RemoveObject {
        id: String,
    },
    Connect {
        expression: String,
    },
    RemoveExpression {
        target: String,
    },
    SetValue {
        id: String,
        value: f64,
    },
    SetPoint {
        id: String,
        x: f64,
        y: f64,
    },
    /// Binds a tracker, or one axis of a point tracker, to an object property.
    Bind {
        tracker: String,
        object: String,
        connector: String,
        #[serde(default = "default_binding")]
        expression: String,
        #[serde(default)]
        axis: Option<Axis>,
    },
    Unbind {
        tracker: String,
        object: String,
        connector: String,
    },
    AnimateTo {
        tracker: String,
        value: f64,
        #[serde(flatten)]
        options: TweenOptions,
    },
    AnimatePoint {
        point: String,
        x: f64,
        y: f64,
        #[serde(default)]
        staging: PointStaging,
        #[serde(flatten)]
        options: TweenOptions,
    },
    Reveal {
        object: String,
        #[serde(flatten)]
        options: TweenOptions,
    },
    Hide {
        object: String,
        #[serde(flatten)]
        options: TweenOptions,
    },
    Play,
    Reverse,
    ResetAll,
    FinishAll,
    MoveGroup {
        index: usize,
        direction: MoveDirection,
    },
    RemoveAnimation {
        id: AnimationId,
    },
    /// Advances playback by `seconds` in frame-sized steps.
    Advance {
        seconds: f64,
    },
    DestroyTracker {
        id: String,
    },
}

/// Final state printed after a script has run.
#[derive(Debug, Serialize)]
pub struct StageReport {
    pub time: f64,
    pub trackers: BTreeMap<String, f64>,
    pub expressions: BTreeMap<String, String>,
    pub objects: Vec<SceneObject>,
    pub connections: Vec<ConnectOutcome>,
    pub active_step: usize,
    pub steps: Vec<StepSummary>,
}

pub fn run_script(script: &Script, playback: PlaybackConfig) -> Result<StageReport> {
    let mut objects = SceneObjects::new();
    for spec in &script.objects {
        objects.add(SceneObject::new(spec.id.clone(), spec.kind))?;
    }
    let mut animator = TrackerAnimator::new(TrackerNetwork::new(objects), playback);
    let mut connections = Vec::new();

    for (index, command) in script.commands.iter().enumerate() {
        tracing::debug!(index, ?command, "running command");
        if let Some(outcome) = apply(&mut animator, command)? {
            if !outcome.success {
                tracing::warn!(index, message = %outcome.message, "expression rejected");
            }
            connections.push(outcome);
        }
    }

    Ok(report(&animator, connections))
}

/// Runs one command. Connect results are reported rather than failing the
/// script.
fn apply(
    animator: &mut TrackerAnimator<SceneObjects>,
    command: &Command,
) -> Result<Option<ConnectOutcome>> {
    match command {
        Command::CreateTracker { id, value } => animator.network_mut().create_tracker(id, *value)?,
        Command::CreatePoint { id, x, y } => {
            animator.network_mut().create_point_tracker(id, *x, *y)?;
        }
        Command::AddObject(spec) => animator
            .network_mut()
            .objects_mut()
            .add(SceneObject::new(spec.id.clone(), spec.kind))?,
        Command::RemoveObject { id } => {
            animator.forget_object(id);
            if animator.network_mut().objects_mut().remove(id).is_none() {
                return Err(StageError::UnknownObject(id.clone()));
            }
        }
        Command::Connect { expression } => {
            let result = animator.network_mut().connect(expression);
            return Ok(Some(ConnectOutcome::from(result)));
        }
        Command::RemoveExpression { target } => {
            animator.network_mut().remove_expression(target);
        }
        Command::SetValue { id, value } => {
            if !animator.network_mut().set_value(id, *value) {
                return Err(StageError::UnknownTracker(id.clone()));
            }
        }
        Command::SetPoint { id, x, y } => {
            if !animator.network_mut().set_point_value(id, *x, *y) {
                return Err(StageError::UnknownTracker(id.clone()));
            }
        }
        Command::Bind {
            tracker,
            object,
            connector,
            expression,
            axis,
        } => match axis {
            None => animator.connect_value_tracker_to_object(tracker, object, connector, expression)?,
            Some(Axis::X) => {
                animator.connect_x_point_tracker_to_object(tracker, object, connector, expression)?
            }
            Some(Axis::Y) => {
                animator.connect_y_point_tracker_to_object(tracker, object, connector, expression)?
            }
        },
        Command::Unbind {
            tracker,
            object,
            connector,
        } => {
            animator.network_mut().unbind_object(tracker, object, connector);
        }
        Command::AnimateTo {
            tracker,
            value,
            options,
        } => {
            animator.animate_tracker_to(tracker, *value, *options)?;
        }
        Command::AnimatePoint {
            point,
            x,
            y,
            staging,
            options,
        } => {
            animator.animate_point_to(point, *x, *y, *options, *staging)?;
        }
        Command::Reveal { object, options } => {
            animator.reveal(object, *options)?;
        }
        Command::Hide { object, options } => {
            animator.hide(object, *options)?;
        }
        Command::Play => {
            animator.play_next();
        }
        Command::Reverse => {
            animator.play_previous();
        }
        Command::ResetAll => animator.reset_all(),
        Command::FinishAll => animator.finish_all(),
        Command::MoveGroup { index, direction } => {
            animator.timeline_mut().move_group(*index, *direction);
        }
        Command::RemoveAnimation { id } => {
            if !animator.remove_animation(id) {
                return Err(StageError::UnknownAnimation(id.to_string()));
            }
        }
        Command::Advance { seconds } => {
            animator.run_for(*seconds);
        }
        Command::DestroyTracker { id } => {
            if animator.destroy_tracker(id).is_empty() {
                return Err(StageError::UnknownTracker(id.clone()));
            }
        }
    }
    Ok(None)
}

fn report(animator: &TrackerAnimator<SceneObjects>, connections: Vec<ConnectOutcome>) -> StageReport {
    let network = animator.network();
    let trackers = network
        .trackers()
        .iter()
        .map(|tracker| (tracker.id().to_string(), tracker.value()))
        .collect();
    let expressions = network
        .graph()
        .targets()
        .filter_map(|target| {
            network
                .expression(target)
                .map(|source| (target.to_string(), source.to_string()))
        })
        .collect();
    StageReport {
        time: animator.clock().time_seconds,
        trackers,
        expressions,
        objects: network.objects().iter().cloned().collect(),
        connections,
        active_step: animator.timeline().active_index(),
        steps: animator.timeline().get_groups_with_meta(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(json: &str) -> Script {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn runs_a_linked_animation() {
        let script = script(
            r#"{
                "objects": [{ "id": "sun", "kind": "circle" }],
                "commands": [
                    { "op": "create_tracker", "id": "t" },
                    { "op": "create_tracker", "id": "u" },
                    { "op": "connect", "expression": "[u] = [t] * 3 + 1;" },
                    { "op": "bind", "tracker": "u", "object": "sun", "connector": "radius" },
                    { "op": "animate_to", "tracker": "t", "value": 2, "duration": 0.5, "easing": "linear" },
                    { "op": "play" },
                    { "op": "advance", "seconds": 1.0 }
                ]
            }"#,
        );
        let report = run_script(&script, PlaybackConfig::default()).unwrap();
        assert_eq!(report.trackers["t"], 2.0);
        assert_eq!(report.trackers["u"], 7.0);
        assert_eq!(report.expressions["u"], "[u] = [t] * 3 + 1;");
        assert_eq!(report.objects[0].property("radius"), Some(7.0));
        assert!(report.connections[0].success);
        assert_eq!(report.steps.len(), 1);
    }

    #[test]
    fn rejected_connections_do_not_stop_the_script() {
        let script = script(
            r#"{ "commands": [
                { "op": "create_tracker", "id": "t" },
                { "op": "create_tracker", "id": "u" },
                { "op": "connect", "expression": "[u] = [t] + 1;" },
                { "op": "connect", "expression": "[t] = [u] + 1;" },
                { "op": "connect", "expression": "[t] = 2" }
            ] }"#,
        );
        let report = run_script(&script, PlaybackConfig::default()).unwrap();
        let messages: Vec<&str> = report
            .connections
            .iter()
            .map(|outcome| outcome.message.as_str())
            .collect();
        assert!(report.connections[0].success);
        assert!(messages[1].starts_with("circular dependency"));
        assert_eq!(messages[2], "expression must end with a semicolon (;)");
    }

    #[test]
    fn other_failures_abort() {
        let script = script(r#"{ "commands": [{ "op": "set_value", "id": "ghost", "value": 1 }] }"#);
        assert!(matches!(
            run_script(&script, PlaybackConfig::default()),
            Err(StageError::UnknownTracker(_))
        ));
    }

    #[test]
    fn point_axes_bind_separately() {
        let script = script(
            r#"{
                "objects": [{ "id": "dot", "kind": "circle" }],
                "commands": [
                    { "op": "create_point", "id": "p", "x": 1, "y": 2 },
                    { "op": "bind", "tracker": "p", "axis": "x", "object": "dot", "connector": "x" },
                    { "op": "bind", "tracker": "p", "axis": "y", "object": "dot", "connector": "y", "expression": "value * 10" },
                    { "op": "set_point", "id": "p", "x": 4, "y": 5 }
                ]
            }"#,
        );
        let report = run_script(&script, PlaybackConfig::default()).unwrap();
        assert_eq!(report.objects[0].property("x"), Some(4.0));
        assert_eq!(report.objects[0].property("y"), Some(50.0));
    }
}
