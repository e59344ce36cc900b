use speculate2::speculate;

speculate! {
    use std::sync::Arc;

    use taskledger_core::events::*;
    use taskledger_core::models::*;
    use taskledger_core::*;

    struct FailingSink;

    impl EventSink for FailingSink {
        fn publish(&self, _event: &Event) -> std::result::Result<(), PublishError> {
            Err(PublishError::Sink("broker unavailable".into()))
        }
    }

    fn seeded_repo() -> (EventEmittingRepository<Database, Arc<MemorySink>>, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let db = Database::open_memory().expect("Failed to create test database");
        let repo = EventEmittingRepository::over_database(db, sink.clone());
        repo.save_roadmap(&Roadmap::new("roadmap-1", "V", "C").unwrap()).unwrap();
        repo.save_track(
            &Track::new(NewTrack {
                id: "DW-track-1".into(),
                roadmap_id: "roadmap-1".into(),
                title: "Core".into(),
                ..Default::default()
            })
            .unwrap(),
        )
        .unwrap();
        (repo, sink)
    }

    fn new_task(id: &str) -> Task {
        Task::new(NewTask {
            id: id.into(),
            track_id: "DW-track-1".into(),
            title: "Write importer".into(),
            ..Default::default()
        })
        .unwrap()
    }

    describe "event emitting repository" {
        it "names events by source, entity and action" {
            let (_repo, sink) = seeded_repo();
            assert_eq!(
                sink.names(),
                vec!["task-manager.roadmap.created", "task-manager.track.created"]
            );
            let events = sink.events();
            assert_eq!(events[1].entity, "track");
            assert_eq!(events[1].payload["id"], "DW-track-1");
        }

        it "reports status transitions with the previous status" {
            let (repo, sink) = seeded_repo();
            let mut task = new_task("DW-task-1");
            repo.save_task(&task).unwrap();
            sink.take();

            task.transition_to(TaskStatus::InProgress);
            repo.update_task(&task).unwrap();
            task.transition_to(TaskStatus::Done);
            repo.update_task(&task).unwrap();
            task.title = "Write the importer".into();
            repo.update_task(&task).unwrap();

            let events = sink.take();
            let actions: Vec<_> = events.iter().map(|e| e.action.as_str()).collect();
            assert_eq!(actions, vec!["status_changed", "completed", "updated"]);
            assert_eq!(events[1].payload["previous_status"], "in-progress");
            assert!(events[2].payload.get("previous_status").is_none());
        }

        it "emits track completion and blocking" {
            let (repo, sink) = seeded_repo();
            let mut track = repo.get_track("DW-track-1").unwrap();
            sink.take();

            track.status = TrackStatus::Blocked;
            repo.update_track(&track).unwrap();
            track.status = TrackStatus::Complete;
            repo.update_track(&track).unwrap();

            let actions: Vec<_> = sink.take().into_iter().map(|e| e.action).collect();
            assert_eq!(actions, vec!["blocked", "completed"]);
        }

        it "emits iteration lifecycle events" {
            let (repo, sink) = seeded_repo();
            let iteration = Iteration::new(NewIteration {
                number: 1,
                name: "First".into(),
                ..Default::default()
            })
            .unwrap();
            repo.save_iteration(&iteration).unwrap();
            repo.start_iteration(1).unwrap();
            repo.complete_iteration(1).unwrap();

            let events = sink.take();
            let names: Vec<_> = events.iter().skip(2).map(|e| e.name.as_str()).collect();
            assert_eq!(
                names,
                vec![
                    "task-manager.iteration.created",
                    "task-manager.iteration.started",
                    "task-manager.iteration.completed",
                ]
            );
            assert_eq!(events[3].payload["previous_status"], "planned");
            assert_eq!(events[4].payload["previous_status"], "current");
        }

        it "publishes the deleted entity snapshot" {
            let (repo, sink) = seeded_repo();
            repo.save_task(&new_task("DW-task-1")).unwrap();
            sink.take();

            repo.delete_task("DW-task-1").unwrap();
            let events = sink.take();
            assert_eq!(events.len(), 1);
            assert_eq!(events[0].action, "deleted");
            assert_eq!(events[0].payload["title"], "Write importer");
        }

        it "publishes nothing when the mutation fails" {
            let (repo, sink) = seeded_repo();
            sink.take();

            repo.save_task(&new_task("DW-task-1")).unwrap();
            let err = repo.save_task(&new_task("DW-task-1")).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::AlreadyExists);
            assert_eq!(sink.names(), vec!["task-manager.task.created"]);
        }

        it "keeps the mutation when the sink fails" {
            let db = Database::open_memory().unwrap();
            let repo = EventEmittingRepository::new(db, FailingSink);
            repo.save_roadmap(&Roadmap::new("roadmap-1", "V", "C").unwrap()).unwrap();
            assert!(repo.inner().get_roadmap("roadmap-1").is_ok());
        }

        it "uses a custom source" {
            let sink = MemorySink::new();
            let db = Database::open_memory().unwrap();
            let repo = EventEmittingRepository::with_source(db, &sink, "planner");
            repo.set_project_code("OPS").unwrap();
            assert_eq!(sink.events()[0].source, "planner");
            assert_eq!(repo.project_code().unwrap(), "OPS");
        }

        it "forwards events over a channel" {
            let (channel, rx) = ChannelSink::new();
            let db = Database::open_memory().unwrap();
            let repo = EventEmittingRepository::new(db, channel);
            repo.save_roadmap(&Roadmap::new("roadmap-1", "V", "C").unwrap()).unwrap();
            let event = rx.try_recv().unwrap();
            assert_eq!(event.name, "task-manager.roadmap.created");
        }
    }
}
