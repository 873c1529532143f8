#[path = "./record_tools.rs"]
mod record_tools;

use coalrustts::*;
use record_tools::*;

fn mean_tmrca(builder: SimulationBuilder, replicates: usize) -> f64 {
    let total: f64 = Replicates::new(builder, replicates)
        .unwrap()
        .map(|sim| tmrca(&sim.unwrap().simulate().unwrap()))
        .sum();
    total / replicates as f64
}

#[test]
fn test_growth_shortens_genealogies() {
    let constant = SimulationBuilder::new().sample_size(10).seed(5);
    let growing = constant
        .clone()
        .populations(vec![PopulationConfiguration::new(1.0).growth_rate(2.5)]);
    let a = mean_tmrca(constant, 50);
    let b = mean_tmrca(growing, 50);
    assert!(b < a / 2.0, "{} {}", a, b);
}

#[test]
fn test_size_change_rescales_times() {
    let small = SimulationBuilder::new()
        .sample_size(10)
        .seed(8)
        .demographic_events(vec![DemographicEvent::PopulationParametersChange {
            time: 0.0,
            population: None,
            initial_size: Some(0.01),
            growth_rate: None,
        }]);
    let a = mean_tmrca(SimulationBuilder::new().sample_size(10).seed(8), 50);
    let b = mean_tmrca(small, 50);
    assert!(b < a / 10.0, "{} {}", a, b);
}

#[test]
fn test_isolated_populations_never_coalesce() {
    let result = SimulationBuilder::new()
        .samples(vec![
            Sample::contemporary(0.into()),
            Sample::contemporary(0.into()),
            Sample::contemporary(1.into()),
        ])
        .populations(vec![PopulationConfiguration::default(); 2])
        .seed(1)
        .build()
        .unwrap()
        .simulate();
    assert!(matches!(
        result,
        Err(CoalrusttsError::InfiniteWaitingTime { .. })
    ));
}

#[test]
fn test_mass_migration() {
    let samples = (0..6)
        .map(|i| Sample::contemporary(PopulationId::from(i % 2)))
        .collect::<Vec<_>>();
    let output = SimulationBuilder::new()
        .samples(samples)
        .populations(vec![PopulationConfiguration::default(); 2])
        .recombination_rate(1.0)
        .demographic_events(vec![DemographicEvent::MassMigration {
            time: 1.0,
            source: 1.into(),
            dest: 0.into(),
            proportion: 1.0,
        }])
        .flags(SimulationFlags::STORE_MIGRATIONS | SimulationFlags::VALIDATE_STATE)
        .seed(99)
        .build()
        .unwrap()
        .simulate()
        .unwrap();
    assert!(!output.migrations.is_empty());
    for m in output.migrations.iter() {
        assert_eq!(m.time.raw(), 1.0);
        assert_eq!(m.source, 1);
        assert_eq!(m.dest, 0);
    }
    assert!(tmrca(&output) > 1.0);
    output.check_records().unwrap();
    assert_single_root_everywhere(&output);
}

#[test]
fn test_continuous_migration() {
    let samples = (0..6)
        .map(|i| Sample::contemporary(PopulationId::from(i % 3)))
        .collect::<Vec<_>>();
    let output = SimulationBuilder::new()
        .samples(samples)
        .populations(vec![PopulationConfiguration::default(); 3])
        .migration_matrix(vec![
            vec![0.0, 1.0, 1.0],
            vec![1.0, 0.0, 1.0],
            vec![1.0, 1.0, 0.0],
        ])
        .flags(SimulationFlags::STORE_MIGRATIONS)
        .seed(12)
        .build()
        .unwrap()
        .simulate()
        .unwrap();
    assert!(output.counters.num_migration_events() > 0);
    assert_eq!(
        output.migrations.len() as u64,
        output.counters.num_migration_events()
    );
    output.check_records().unwrap();
    assert_single_root_everywhere(&output);
}

#[test]
fn test_migration_rate_change() {
    let output = SimulationBuilder::new()
        .samples(vec![
            Sample::contemporary(0.into()),
            Sample::contemporary(1.into()),
        ])
        .populations(vec![PopulationConfiguration::default(); 2])
        .demographic_events(vec![DemographicEvent::MigrationRateChange {
            time: 0.5,
            matrix_index: None,
            rate: 1.0,
        }])
        .seed(4)
        .build()
        .unwrap()
        .simulate()
        .unwrap();
    assert!(output.counters.num_migration_events() > 0);
    assert!(tmrca(&output) > 0.5);
}

#[test]
fn test_simple_bottleneck() {
    let output = SimulationBuilder::new()
        .sample_size(10)
        .demographic_events(vec![DemographicEvent::SimpleBottleneck {
            time: 0.01,
            population: 0.into(),
            proportion: 1.0,
        }])
        .seed(23)
        .build()
        .unwrap()
        .simulate()
        .unwrap();
    let last = output.records.last().unwrap();
    assert_eq!(last.time.raw(), 0.01);
    assert!(last.children.len() > 2);
    output.check_records().unwrap();
    assert_single_root_everywhere(&output);
}

#[test]
fn test_instantaneous_bottleneck() {
    let output = SimulationBuilder::new()
        .sample_size(10)
        .recombination_rate(0.5)
        .demographic_events(vec![DemographicEvent::InstantaneousBottleneck {
            time: 0.01,
            population: 0.into(),
            strength: 100.0,
        }])
        .flags(SimulationFlags::VALIDATE_STATE)
        .seed(31)
        .build()
        .unwrap()
        .simulate()
        .unwrap();
    assert_eq!(tmrca(&output), 0.01);
    assert!(output.records.iter().any(|r| r.children.len() > 2));
    output.check_records().unwrap();
    assert_single_root_everywhere(&output);
}

#[test]
fn test_ancient_samples() {
    let mut samples = vec![Sample::contemporary(0.into()); 4];
    samples.push(Sample::new(0.into(), 2.0));
    samples.push(Sample::new(0.into(), 2.0));
    let output = SimulationBuilder::new()
        .samples(samples)
        .recombination_rate(1.0)
        .flags(SimulationFlags::VALIDATE_STATE)
        .seed(77)
        .build()
        .unwrap()
        .simulate()
        .unwrap();
    assert_eq!(output.nodes[4].time.raw(), 2.0);
    assert_eq!(output.nodes[5].time.raw(), 2.0);
    for r in output.records.iter() {
        if r.children.iter().any(|c| *c == 4 || *c == 5) {
            assert!(r.time.raw() > 2.0);
        }
    }
    output.check_records().unwrap();
    assert_single_root_everywhere(&output);
}

#[test]
fn test_max_time() {
    let output = SimulationBuilder::new()
        .sample_size(20)
        .recombination_rate(2.0)
        .max_time(0.1)
        .seed(2)
        .build()
        .unwrap()
        .simulate()
        .unwrap();
    assert_eq!(output.outcome, Some(RunOutcome::ReachedMaxTime));
    assert_eq!(output.time, 0.1);
    assert!(output.records.iter().all(|r| r.time.raw() <= 0.1));
}
