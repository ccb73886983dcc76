#[cfg(test)]
mod tests {
    use cutline_lib::action_router::{run_edit_plan, RouterError};
    use cutline_lib::edit_plan::{parse_edit_plan, EditAction, TrackRef};
    use cutline_lib::timeline::TrackKind;
    use cutline_lib::validator::{validate_plan, VALIDATION_REJECTED};
    use cutline_lib::{AddClipRequest, EditError, Time, TimelineEngine, TimelineEvent};

    fn secs(v: f64) -> Time {
        Time::from_secs(v)
    }

    fn engine_with_clip() -> (TimelineEngine, String) {
        let mut engine = TimelineEngine::new();
        let track = engine.add_track(TrackKind::Video).unwrap();
        let id = engine
            .add_clip(AddClipRequest::new(track, "a.mp4", Time::ZERO, secs(8.0)))
            .unwrap();
        (engine, id.to_string())
    }

    #[test]
    fn test_parse_valid_plan() {
        let json = r#"
        Here is the plan:
        {
            "description": "Deleting the bad clip",
            "actions": [
                {
                    "type": "DELETE",
                    "target_clip_id": "123"
                }
            ]
        }
        "#;
        let plan = parse_edit_plan(json).expect("Failed to parse valid plan");
        assert_eq!(plan.actions.len(), 1);
        assert!(matches!(plan.actions[0], EditAction::Delete { .. }));
        assert_eq!(plan.description.as_deref(), Some("Deleting the bad clip"));
    }

    #[test]
    fn test_parse_every_action_type() {
        let json = r#"{"actions": [
            {"type": "ADD_TRACK", "kind": "audio"},
            {"type": "ADD_CLIP", "track": 0, "source_path": "b.mp4", "start_time": 1, "duration": 2},
            {"type": "MOVE", "target_clip_id": "@0", "new_start_time": 3},
            {"type": "RELOCATE", "target_clip_id": "@0", "track": 1, "new_start_time": 0},
            {"type": "TRIM", "target_clip_id": "@0", "edge": "left", "time": 0.5},
            {"type": "SPLIT", "target_clip_id": "@0", "split_time": 1},
            {"type": "SELECT", "target_clip_id": null},
            {"type": "SET_PLAYHEAD", "time": 4},
            {"type": "DELETE", "target_clip_id": "@1"},
            {"type": "MOVE_TRACK", "track": 1, "to_index": 0},
            {"type": "REMOVE_TRACK", "track": 0},
            {"type": "UNDO"},
            {"type": "REDO"}
        ]}"#;
        let plan = parse_edit_plan(json).unwrap();
        assert_eq!(plan.actions.len(), 13);
        assert_eq!(plan.actions[0], EditAction::AddTrack { kind: TrackKind::Audio });
        assert!(matches!(plan.actions[5], EditAction::Split { .. }));
    }

    #[test]
    fn test_validation_logic() {
        let (engine, _) = engine_with_clip();
        let empty_plan = parse_edit_plan(r#"{"actions": []}"#).unwrap();
        let err = validate_plan(&empty_plan, engine.state()).unwrap_err();
        assert_eq!(err.code, VALIDATION_REJECTED);

        let bad_ref = parse_edit_plan(r#"{"actions": [{"type": "DELETE", "target_clip_id": "123"}]}"#).unwrap();
        assert!(validate_plan(&bad_ref, engine.state()).is_err());
    }

    #[test]
    fn test_run_plan_split_then_delete() {
        let (mut engine, id) = engine_with_clip();
        engine.set_ripple_edit(true);
        let json = format!(
            r#"{{"actions": [
                {{"type": "SPLIT", "target_clip_id": "{id}", "split_time": 3}},
                {{"type": "DELETE", "target_clip_id": "{id}"}}
            ]}}"#
        );
        let plan = parse_edit_plan(&json).unwrap();
        let report = run_edit_plan(&mut engine, &plan).unwrap();
        assert_eq!(report.applied, 2);
        assert_eq!(report.created_clips.len(), 1);

        let second = engine.clip(report.created_clips[0]).unwrap();
        assert_eq!(second.start_time, Time::ZERO);
        assert_eq!(second.duration, secs(5.0));
        assert_eq!(report.duration, secs(5.0));
    }

    #[test]
    fn test_run_plan_uses_created_references() {
        let mut engine = TimelineEngine::new();
        let json = r#"{"actions": [
            {"type": "ADD_TRACK", "kind": "video"},
            {"type": "ADD_CLIP", "track": 0, "source_path": "intro.mp4", "start_time": 0, "duration": 4},
            {"type": "ADD_CLIP", "track": 0, "source_path": "outro.mp4", "start_time": 10, "duration": 2},
            {"type": "MOVE", "target_clip_id": "@1", "new_start_time": 4},
            {"type": "SELECT", "target_clip_id": "@0"}
        ]}"#;
        let report = run_edit_plan(&mut engine, &parse_edit_plan(json).unwrap()).unwrap();
        assert_eq!(report.created_tracks.len(), 1);
        let outro = engine.clip(report.created_clips[1]).unwrap();
        assert_eq!(outro.start_time, secs(4.0));
        assert_eq!(engine.selected_clip(), Some(report.created_clips[0]));
    }

    #[test]
    fn test_failed_plan_rolls_back() {
        let (mut engine, id) = engine_with_clip();
        let before = engine.state().clone();
        let undo_depth = engine.undo_len();
        let rx = engine.subscribe();

        let json = format!(
            r#"{{"actions": [
                {{"type": "SPLIT", "target_clip_id": "{id}", "split_time": 4}},
                {{"type": "ADD_CLIP", "track": 0, "source_path": "b.mp4", "start_time": 1, "duration": 1}}
            ]}}"#
        );
        let err = run_edit_plan(&mut engine, &parse_edit_plan(&json).unwrap()).unwrap_err();
        match err {
            RouterError::Action { index, source, .. } => {
                assert_eq!(index, 1);
                assert!(matches!(source, EditError::OverlapConflict { .. }));
            }
            other => panic!("unexpected error {other}"),
        }
        assert_eq!(engine.state(), &before);
        assert_eq!(engine.undo_len(), undo_depth);
        assert!(rx.try_iter().any(|e| e == TimelineEvent::StateRestored));
    }

    #[test]
    fn test_track_reference_by_id() {
        let mut engine = TimelineEngine::new();
        engine.add_track(TrackKind::Video).unwrap();
        let audio = engine.add_track(TrackKind::Audio).unwrap();
        let plan = cutline_lib::edit_plan::EditPlan {
            actions: vec![EditAction::MoveTrack {
                track: TrackRef::Id(audio.to_string()),
                to_index: 0,
            }],
            description: None,
        };
        run_edit_plan(&mut engine, &plan).unwrap();
        assert_eq!(engine.tracks()[0].id, audio);
    }
}
