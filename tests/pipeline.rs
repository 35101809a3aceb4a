use approx::assert_abs_diff_eq;
use envtrend::analysis::{analyze, Dataset, Model, Options, Predictor};
use envtrend::load::{read_csv, RawSeries};
use envtrend::series::Reduction;

const SPECIES: &str = "\
year,threatened
1996,5205
1998,5328
2000,11046
2002,11167
2003,12259
2004,15503
2006,16118
2007,16306
2008,16928
2009,17291
";

const TEMPERATURE: &str = "\
date,temperature
1996-01-01,8.9
1996-07-01,9.3
1998-01-01,9.4
1998-07-01,9.6
2000-01-01,9.5
2000-07-01,9.5
2002-01-01,9.6
2002-07-01,9.8
2003-01-01,9.5
2003-07-01,10.1
2004-01-01,9.7
2004-07-01,9.7
2006-01-01,9.8
2006-07-01,10.0
2007-01-01,10.0
2007-07-01,9.8
2008-01-01,9.9
2008-07-01,9.7
2009-01-01,10.1
2009-07-01,10.1
2010-01-01,10.3
2010-07-01,
2011-01-01,10.4
";

const CARBON: &str = "\
year,ppm
1996,362.6
1998,366.7
2000,369.6
2002,373.3
2003,375.8
2004,377.5
2006,381.9
2007,383.8
2008,385.6
2009,387.4
";

fn dataset(name: &str, csv: &str, reduction: Reduction) -> Dataset {
    let raw = read_csv(csv.as_bytes()).unwrap();
    Dataset::new(name, raw.into_scalar(reduction))
}

#[test]
fn temperature_readings_are_averaged() {
    let RawSeries::Multi(readings) = read_csv(TEMPERATURE.as_bytes()).unwrap() else {
        panic!("temperature holds several readings per year");
    };
    assert_eq!(readings[&2010], vec![10.3]);
    let temperature = dataset("Temperature", TEMPERATURE, Reduction::Mean);
    assert_abs_diff_eq!(temperature.series[&1996], 9.1, epsilon = 1e-12);
    assert_abs_diff_eq!(temperature.series[&2003], 9.8, epsilon = 1e-12);
}

#[test]
fn single_predictor_forecast() {
    let species = dataset("Threatened Species", SPECIES, Reduction::Sum);
    // the last two years are partial
    let temperature = dataset("Temperature", TEMPERATURE, Reduction::Mean).with_drop_last(2);
    let report = analyze(
        &species,
        &[Predictor {
            dataset: temperature,
            change: 0.5,
        }],
        &Options {
            excluded_years: vec![2003],
            forecast_year: Some(2020),
        },
    )
    .unwrap();

    assert_eq!(
        report.years,
        vec![1996, 1998, 2000, 2002, 2004, 2006, 2007, 2008, 2009]
    );
    assert_eq!(report.forecast_year, 2020);

    let Model::Simple {
        line,
        diagnostics,
        forecast,
    } = &report.model
    else {
        panic!("one predictor gives a line fit");
    };
    assert!(line.slope > 0.);
    assert_eq!(diagnostics.residuals.len(), report.years.len());
    assert_abs_diff_eq!(diagnostics.residuals.sum(), 0., epsilon = 1e-6);
    assert!(diagnostics.r_squared > 0. && diagnostics.r_squared <= 1.);

    let temperature = &report.predictors[0];
    assert_abs_diff_eq!(temperature.last_known, 10.1, epsilon = 1e-12);
    assert_abs_diff_eq!(forecast.x, 10.6, epsilon = 1e-12);
    assert_abs_diff_eq!(report.prediction, line.eval(10.6), epsilon = 1e-9);
    assert_abs_diff_eq!(
        report.half_width,
        1.28 * diagnostics.residual_std_dev,
        epsilon = 1e-9
    );
    assert!(report.lower() < report.prediction && report.prediction < report.upper());
    assert_eq!(report.predictors[0].r_squared, report.r_squared());
}

#[test]
fn two_predictor_forecast() {
    let species = dataset("Threatened Species", SPECIES, Reduction::Sum);
    let temperature = dataset("Temperature", TEMPERATURE, Reduction::Mean);
    let carbon = dataset("Carbon", CARBON, Reduction::Sum);
    let report = analyze(
        &species,
        &[
            Predictor {
                dataset: temperature,
                change: 0.2,
            },
            Predictor {
                dataset: carbon,
                change: 20.,
            },
        ],
        &Options::default(),
    )
    .unwrap();

    let Model::Multiple(model) = &report.model else {
        panic!("two predictors give a multiple model");
    };
    assert_eq!(model.dimension(), 2);
    assert_eq!(model.n_observations, 10);
    assert_eq!(report.forecast_year, 2010);
    // temperature goes on until 2011
    assert_abs_diff_eq!(report.predictors[0].future, 10.6, epsilon = 1e-12);
    assert_abs_diff_eq!(report.predictors[1].future, 407.4, epsilon = 1e-9);
    let r2 = report.r_squared().unwrap();
    assert!(r2 <= 1.);
    // adding a predictor never lowers the in-sample fit
    for predictor in &report.predictors {
        assert!(r2 + 1e-9 >= predictor.r_squared.unwrap());
    }
    assert!(report.to_string().contains("Threatened Species in 2010"));
}
