// Tests for Simulation scheduling and dispatch
#[cfg(test)]
mod tests {
    use super::super::support::{log, Inert, Looper, Sink, Tagger};
    use crate::core::error::SimulationError;
    use crate::core::execution::{
        EventFlags, EventOutcome, EventRecord, Simulation, SimulationConfig, SimulationObserver,
        UnroutedOutputPolicy,
    };
    use crate::core::signals::{Payload, Signal, SignalType};
    use crate::core::types::SimTime;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::thread;
    use std::time::Duration;

    fn tag(value: i64) -> [(&'static str, Signal); 1] {
        [("tag", Signal::computed(Payload::Int(value)))]
    }

    #[derive(Default)]
    struct Recorder {
        advances: Vec<(SimTime, SimTime)>,
        retired: Vec<EventRecord>,
    }

    struct SharedRecorder(Rc<RefCell<Recorder>>);

    impl SimulationObserver for SharedRecorder {
        fn on_time_advance(&mut self, old_time: SimTime, new_time: SimTime) {
            self.0.borrow_mut().advances.push((old_time, new_time));
        }

        fn on_event_retired(&mut self, record: &EventRecord) {
            self.0.borrow_mut().retired.push(record.clone());
        }
    }

    #[test]
    fn test_dispatch_order_is_time_then_fifo() {
        let log = log();
        let mut sim = Simulation::default();
        let device = sim.add_device(Tagger::new(&log)).unwrap();

        for (time, value) in [(5.0, 0), (3.0, 1), (3.0, 2), (7.0, 3)] {
            sim.schedule_event(time, device, tag(value)).unwrap();
        }
        let summary = sim.run().unwrap();

        assert_eq!(
            *log.borrow(),
            vec![(3.0, 1), (3.0, 2), (5.0, 0), (7.0, 3)],
            "Equal timestamps must dispatch in scheduling order"
        );
        assert_eq!(summary.events_dispatched, 4);
        assert_eq!(summary.final_time, 7.0);
        assert_eq!(summary.pending_events, 0);
    }

    #[test]
    fn test_scheduling_into_the_past_fails() {
        let log = log();
        let mut sim = Simulation::default();
        let device = sim.add_device(Tagger::new(&log)).unwrap();

        sim.schedule_event(5.0, device, tag(0)).unwrap();
        sim.run().unwrap();
        assert_eq!(sim.current_time(), 5.0);

        let result = sim.schedule_event(3.0, device, tag(1));
        assert!(matches!(
            result,
            Err(SimulationError::CausalityViolation { scheduled, current }) if scheduled == 3.0 && current == 5.0
        ));
        assert!(matches!(
            sim.schedule_event(f64::INFINITY, device, tag(1)),
            Err(SimulationError::InvalidTime(_))
        ));
        assert!(sim.schedule_event(5.0, device, tag(2)).is_ok(), "Same-time scheduling is allowed");
    }

    #[test]
    fn test_unknown_target_is_rejected() {
        let mut sim = Simulation::default();
        let stranger = Tagger::new(&log());
        let id = crate::core::devices::Device::id(&stranger);
        assert!(matches!(
            sim.schedule_event(0.0, id, tag(0)),
            Err(SimulationError::NoSuchDevice(missing)) if missing == id
        ));
    }

    #[test]
    fn test_duplicate_device_id() {
        let log = log();
        let mut sim = Simulation::default();
        let id = sim.add_device(Tagger::new(&log)).unwrap();

        let result = sim.add_device(Tagger::with_id(id, &log));
        assert!(matches!(result, Err(SimulationError::DuplicateDeviceId(dup)) if dup == id));
        assert_eq!(sim.devices().len(), 1);
    }

    #[test]
    fn test_device_without_action_fails_the_run() {
        let mut sim = Simulation::default();
        let inert = sim.add_device(Inert::new()).unwrap();
        sim.schedule_event(0.0, inert, Vec::<(String, Signal)>::new()).unwrap();

        let result = sim.run();
        assert!(matches!(result, Err(SimulationError::ActionNotDefined { device }) if device.starts_with("Inert")));
    }

    #[test]
    fn test_same_instant_loop_is_detected() {
        let mut sim = Simulation::new(SimulationConfig::new().with_stall_limit(5));
        let looper = sim.add_device(Looper::new()).unwrap();
        sim.schedule_event(1e-9, looper, Vec::<(String, Signal)>::new()).unwrap();

        match sim.run() {
            Err(SimulationError::NoForwardProgress {
                device,
                time,
                dispatches,
            }) => {
                assert!(device.contains("looper"));
                assert_eq!(time, 1e-9);
                assert_eq!(dispatches, 6);
            }
            other => panic!("Expected NoForwardProgress, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_delay_cycle_between_devices_is_detected() {
        let log = log();
        let mut sim = Simulation::new(
            SimulationConfig::new()
                .with_stall_limit(5)
                .with_max_events(10_000),
        );
        let first = sim.add_device(Tagger::forwarding(&log, 0.0)).unwrap();
        let second = sim.add_device(Tagger::forwarding(&log, 0.0)).unwrap();
        sim.connect(&first.output("out"), &second.input("tag"), SignalType::Int)
            .unwrap();
        sim.connect(&second.output("out"), &first.input("tag"), SignalType::Int)
            .unwrap();

        sim.schedule_event(2.0, first, tag(4)).unwrap();
        match sim.run() {
            Err(SimulationError::NoForwardProgress { time, dispatches, .. }) => {
                assert_eq!(time, 2.0);
                assert_eq!(dispatches, 6);
            }
            other => panic!("Expected NoForwardProgress, got {:?}", other),
        }
        assert_eq!(log.borrow().len(), 10, "Each device ran up to the limit");
        assert!(log.borrow().iter().all(|entry| *entry == (2.0, 4)));
    }

    #[test]
    fn test_dispatch_counts_reset_when_time_advances() {
        let log = log();
        let mut sim = Simulation::new(SimulationConfig::new().with_stall_limit(2));
        let device = sim.add_device(Tagger::new(&log)).unwrap();
        for time in [1.0, 1.0, 2.0, 2.0, 3.0] {
            sim.schedule_event(time, device, tag(0)).unwrap();
        }
        let summary = sim.run().unwrap();
        assert_eq!(summary.events_dispatched, 5);
    }

    #[test]
    fn test_pending_dependency_is_never_read() {
        let log = log();
        let mut sim = Simulation::default();
        let producer = sim.add_device(Tagger::new(&log)).unwrap();
        let consumer = sim.add_device(Sink::new(&log)).unwrap();
        let wire = sim
            .connect(&producer.output("out"), &consumer.input("input"), SignalType::Int)
            .unwrap();

        sim.schedule_event(0.0, consumer, Vec::<(String, Signal)>::new()).unwrap();
        let result = sim.run();
        assert!(matches!(result, Err(SimulationError::InputNotComputed { port, .. }) if port == "input"));
        assert!(log.borrow().is_empty(), "Consumer must not observe a pending input");

        wire.mark_computed(Payload::Int(42)).unwrap();
        sim.schedule_event(1.0, consumer, Vec::<(String, Signal)>::new()).unwrap();
        sim.run().unwrap();
        assert_eq!(*log.borrow(), vec![(1.0, 42)]);
    }

    #[test]
    fn test_dispatch_waits_for_producer_on_another_thread() {
        let log = log();
        let mut sim = Simulation::new(SimulationConfig::new().with_input_wait(Duration::from_secs(5)));
        let consumer = sim.add_device(Sink::new(&log)).unwrap();
        let wire = Signal::new(SignalType::Int);
        sim.register_signal(&consumer, &wire, "input", false).unwrap();

        let producer_handle = wire.clone();
        let producer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer_handle.mark_computed(Payload::Int(7)).unwrap();
        });

        sim.run_device(&consumer, 0.0, Vec::<(String, Signal)>::new()).unwrap();
        producer.join().unwrap();
        assert_eq!(*log.borrow(), vec![(0.0, 7)]);
    }

    #[test]
    fn test_outputs_are_routed_downstream() {
        let log = log();
        let mut sim = Simulation::default();
        let first = sim.add_device(Tagger::forwarding(&log, 1.0)).unwrap();
        let second = sim.add_device(Tagger::new(&log)).unwrap();
        sim.connect(&first.output("out"), &second.input("tag"), SignalType::Int)
            .unwrap();

        sim.schedule_event(0.5, first, tag(9)).unwrap();
        let summary = sim.run().unwrap();

        assert_eq!(*log.borrow(), vec![(0.5, 9), (1.5, 9)]);
        assert_eq!(summary.events_dispatched, 2);
    }

    #[test]
    fn test_unrouted_output_policy() {
        let log = log();
        let mut sim = Simulation::default();
        let lonely = sim.add_device(Tagger::forwarding(&log, 0.0)).unwrap();
        sim.schedule_event(0.0, lonely, tag(1)).unwrap();
        assert!(sim.run().is_ok(), "Default policy drops unrouted outputs");

        let mut strict = Simulation::new(
            SimulationConfig::new().with_unrouted_outputs(UnroutedOutputPolicy::Error),
        );
        let lonely = strict.add_device(Tagger::forwarding(&log, 0.0)).unwrap();
        strict.schedule_event(0.0, lonely, tag(1)).unwrap();
        assert!(matches!(
            strict.run(),
            Err(SimulationError::UnroutedOutput { port, .. }) if port == "out"
        ));
    }

    #[test]
    fn test_observers_see_time_and_outcomes() {
        let log = log();
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        let mut sim = Simulation::default();
        sim.add_observer(Box::new(SharedRecorder(recorder.clone())));

        let first = sim.add_device(Tagger::forwarding(&log, 2.0)).unwrap();
        let second = sim.add_device(Tagger::new(&log)).unwrap();
        sim.connect(&first.output("out"), &second.input("tag"), SignalType::Int)
            .unwrap();
        sim.schedule_event(1.0, first, tag(3)).unwrap();
        sim.run().unwrap();

        let recorder = recorder.borrow();
        assert_eq!(recorder.advances, vec![(0.0, 1.0), (1.0, 3.0)]);
        let outcomes: Vec<EventOutcome> = recorder.retired.iter().map(|r| r.outcome).collect();
        assert_eq!(outcomes, vec![EventOutcome::Produced(1), EventOutcome::Buffered]);
        assert_eq!(recorder.retired[1].target, second);
        assert_eq!(recorder.retired[1].flags, EventFlags::default());
    }

    #[test]
    fn test_horizon_and_event_cap_leave_events_queued() {
        let log = log();
        let mut sim = Simulation::new(SimulationConfig::new().with_end_time(4.0));
        let device = sim.add_device(Tagger::new(&log)).unwrap();
        for (time, value) in [(1.0, 1), (2.0, 2), (5.0, 5)] {
            sim.schedule_event(time, device, tag(value)).unwrap();
        }
        let summary = sim.run().unwrap();
        assert_eq!(summary.events_dispatched, 2);
        assert_eq!(summary.pending_events, 1);
        assert_eq!(summary.final_time, 2.0);

        let mut capped = Simulation::new(SimulationConfig::new().with_max_events(1));
        let device = capped.add_device(Tagger::new(&log)).unwrap();
        capped.schedule_event(0.0, device, tag(0)).unwrap();
        capped.schedule_event(0.0, device, tag(0)).unwrap();
        let summary = capped.run().unwrap();
        assert_eq!(summary.events_dispatched, 1);
        assert_eq!(summary.pending_events, 1);
    }

    #[test]
    fn test_shared_instance_is_reused() {
        let first = Simulation::get_instance();
        let second = Simulation::get_instance();
        assert!(Rc::ptr_eq(&first, &second));

        let log = log();
        let id = first.borrow_mut().add_device(Tagger::new(&log)).unwrap();
        assert!(second.borrow().devices().contains(&id));
    }

    #[test]
    fn test_device_lookup_by_kind() {
        let log = log();
        let mut sim = Simulation::default();
        let id = sim.add_device(Tagger::new(&log)).unwrap();
        assert!(sim.device_as::<Tagger>(&id).is_some());
        assert!(sim.device_as::<Sink>(&id).is_none());
        assert!(sim.device_as_mut::<Tagger>(&id).is_some());
    }
}
