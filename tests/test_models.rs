#[path = "./record_tools.rs"]
mod record_tools;

use coalrustts::*;
use record_tools::*;

fn run(model: SimulationModel, recombination_rate: f64, seed: u64) -> SimulationOutput {
    SimulationBuilder::new()
        .sample_size(10)
        .recombination_rate(recombination_rate)
        .model(model.name())
        .seed(seed)
        .build()
        .unwrap()
        .simulate()
        .unwrap()
}

#[test]
fn test_hudson_end_to_end() {
    let output = run(SimulationModel::Hudson, 5.0, 42);
    assert_eq!(output.outcome, Some(RunOutcome::Completed));
    assert!(output.counters.num_common_ancestor_events() > 20);
    assert!(output.counters.num_recombination_events() > 20);
    assert_eq!(output.counters.num_rejected_common_ancestor_events(), 0);
    output.check_records().unwrap();
    assert_single_root_everywhere(&output);
}

#[test]
fn test_hudson_never_rejects() {
    for seed in 1..6 {
        let output = run(SimulationModel::Hudson, 10.0, seed);
        assert_eq!(output.counters.num_rejected_common_ancestor_events(), 0);
    }
}

#[test]
fn test_smc_models_reject() {
    for model in [SimulationModel::Smc, SimulationModel::SmcPrime] {
        let output = run(model, 5.0, 42);
        assert_eq!(output.outcome, Some(RunOutcome::Completed));
        assert!(output.counters.num_rejected_common_ancestor_events() > 0);
        assert!(output.counters.num_recombination_events() > 0);
        output.check_records().unwrap();
        assert_single_root_everywhere(&output);
    }
}

#[test]
fn test_record_gaps() {
    let hudson = run(SimulationModel::Hudson, 20.0, 1);
    assert!(count_gaps(&hudson.records) > 10);
    for model in [SimulationModel::Smc, SimulationModel::SmcPrime] {
        for seed in 1..4 {
            let output = run(model, 20.0, seed);
            assert_eq!(count_gaps(&output.records), 0);
        }
    }
}

#[test]
fn test_state_stays_consistent() {
    for model in SimulationModel::ALL {
        let output = SimulationBuilder::new()
            .sample_size(6)
            .recombination_rate(3.0)
            .sequence_length(1000)
            .model(model.name())
            .seed(17)
            .flags(SimulationFlags::VALIDATE_STATE)
            .build()
            .unwrap()
            .simulate()
            .unwrap();
        output.check_records().unwrap();
        assert_single_root_everywhere(&output);
    }
}

#[test]
fn test_model_names() {
    for model in SimulationModel::ALL {
        let name = model.name();
        let mut title = name.to_string();
        title[..1].make_ascii_uppercase();
        for s in [name.to_string(), name.to_uppercase(), title] {
            let builder = SimulationBuilder::new().sample_size(2).model(s.as_str());
            let sim = builder.build().unwrap();
            assert_eq!(sim.model().name(), name);
        }
    }
}

#[test]
fn test_bad_model_names() {
    for name in ["", "hudsonx", "smc'", "smc prime", "SMC-PRIME", "dtwf"] {
        match SimulationBuilder::new().sample_size(2).model(name).build() {
            Err(CoalrusttsError::ConfigurationError {
                value: ConfigurationError::UnknownModel { name: n },
            }) => assert_eq!(n, name),
            _ => panic!("{:?} should be rejected", name),
        }
    }
}

#[test]
fn test_bottlenecks_rejected_by_smc_models() {
    let events = [
        DemographicEvent::SimpleBottleneck {
            time: 1.0,
            population: PopulationId::default(),
            proportion: 0.5,
        },
        DemographicEvent::InstantaneousBottleneck {
            time: 1.0,
            population: PopulationId::default(),
            strength: 2.0,
        },
    ];
    for n in 2..=20 {
        for event in events {
            let builder = SimulationBuilder::new()
                .sample_size(n)
                .demographic_events(vec![event]);
            assert!(builder.clone().model("hudson").build().is_ok());
            for model in ["smc", "smc_prime"] {
                match builder.clone().model(model).build() {
                    Err(CoalrusttsError::ConfigurationError {
                        value: ConfigurationError::UnsupportedDemographicEvent { kind, .. },
                    }) => assert_eq!(kind, event.kind().name()),
                    _ => panic!("{} should reject {}", model, event.kind()),
                }
            }
        }
    }
}
