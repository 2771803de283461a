use log::info;
use photon_des::core::physics::EnvelopePhysics;
use photon_des::devices::{BeamSplitterSettings, IdealBeamSplitter, IdealDetector, IdealNPhotonSource};
use photon_des::{DeviceId, Payload, Signal, SignalType, Simulation, SimulationConfig};

const SHOTS: u64 = 200;

/// Delays between the two photons, in seconds
const DELAYS: [f64; 5] = [0.0, 0.5e-9, 1e-9, 2e-9, 4e-9];

struct Setup {
    sim: Simulation,
    sources: [DeviceId; 2],
    detectors: [DeviceId; 2],
}

fn build(seed: u64) -> Result<Setup, Box<dyn std::error::Error>> {
    let mut sim = Simulation::new(SimulationConfig::default())
        .with_physics(EnvelopePhysics::with_seed(seed));

    // Wide enough that a delayed partner still lands inside the window
    let settings = BeamSplitterSettings {
        flush_factor: 1e10,
        ..BeamSplitterSettings::default()
    };
    let bs = sim.add_device(IdealBeamSplitter::with_settings(Some("bs"), settings))?;

    let mut sources = Vec::new();
    for (name, port) in [("source_a", "A"), ("source_b", "B")] {
        let source = sim.add_device(IdealNPhotonSource::new(Some(name)))?;
        sim.set_parameter(&source, "photon_num", Payload::Int(1))?;
        sim.connect(&source.output("output"), &bs.input(port), SignalType::Quantum)?;
        sources.push(source);
    }

    let mut detectors = Vec::new();
    for (name, port) in [("det_c", "C"), ("det_d", "D")] {
        let detector = sim.add_device(IdealDetector::new(Some(name)))?;
        sim.connect(&bs.output(port), &detector.input("input"), SignalType::Quantum)?;
        detectors.push(detector);
    }

    Ok(Setup {
        sim,
        sources: [sources[0], sources[1]],
        detectors: [detectors[0], detectors[1]],
    })
}

fn clicks(sim: &Simulation, detector: &DeviceId) -> u64 {
    sim.device_as::<IdealDetector>(detector)
        .map_or(0, IdealDetector::total_photons)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Error)
        .filter_module("hong_ou_mandel", log::LevelFilter::Info)
        .format_timestamp(None)
        .init();

    println!("Hong-Ou-Mandel dip, {} shots per delay", SHOTS);
    println!("{:>10}  {:>12}", "delay (ns)", "coincidences");

    for delay in DELAYS {
        let mut coincidences = 0;
        for shot in 0..SHOTS {
            let mut setup = build(shot)?;
            let trigger = || [("trigger", Signal::computed(Payload::Bool(true)))];
            setup.sim.schedule_event(0.0, setup.sources[0], trigger())?;
            setup.sim.schedule_event(delay, setup.sources[1], trigger())?;
            setup.sim.run()?;

            let c = clicks(&setup.sim, &setup.detectors[0]);
            let d = clicks(&setup.sim, &setup.detectors[1]);
            if c == 1 && d == 1 {
                coincidences += 1;
            }
        }
        info!("Delay {:.1e}s: {} coincidences", delay, coincidences);
        println!("{:>10.2}  {:>12}", delay * 1e9, coincidences);
    }

    Ok(())
}
