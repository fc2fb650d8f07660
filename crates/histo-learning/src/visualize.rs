//! Quick look at labelled embeddings through a fresh PCA.

use std::ops::RangeInclusive;
use tracing::{info, warn};

use histo_features::FeatureLabelSet;

use crate::config::ReductionMethod;
use crate::error::{LearningError, Result};
use crate::plot::Plot;
use crate::reduction::DimensionalityReducer;

/// Accepted values for the `dimensions` argument of [`visualize`].
pub const VISUALIZE_DIMENSIONS: RangeInclusive<usize> = 2..=10;

/// Project `data` to `dimensions` components and plot it coloured by label.
///
/// Two retained components give a [`Plot::Scatter`]; more give a
/// [`Plot::PairsMatrix`]. The projection is fitted on `data` itself and not
/// kept.
///
/// # Errors
///
/// - [`LearningError::InvalidDimension`] if `dimensions` is outside `2..=10`,
///   or fewer than two components can be extracted from `data`
/// - `MissingRequiredLabel` if `data` has no labels
pub fn visualize(
    data: &FeatureLabelSet,
    dimensions: usize,
    method: ReductionMethod,
) -> Result<Plot> {
    if !VISUALIZE_DIMENSIONS.contains(&dimensions) {
        return Err(LearningError::InvalidDimension(format!(
            "visualization needs between {} and {} dimensions, got {}",
            VISUALIZE_DIMENSIONS.start(),
            VISUALIZE_DIMENSIONS.end(),
            dimensions
        )));
    }
    let labels = data.require_labels("visualization")?;

    let requested = if dimensions > data.n_features() {
        warn!(
            "Requested {} dimensions but the data has {} feature column(s)",
            dimensions,
            data.n_features()
        );
        data.n_features()
    } else {
        dimensions
    };

    let (reducer, coordinates) = DimensionalityReducer::fit(method, data.features(), requested)?;
    let k = reducer.k();
    if k < 2 {
        return Err(LearningError::InvalidDimension(format!(
            "only {} component(s) can be extracted from {} x {} data; at least 2 are needed to plot",
            k,
            data.n_samples(),
            data.n_features()
        )));
    }

    let title = format!("{} projection ({} components)", method.as_str().to_uppercase(), k);
    let dimensions = reducer.component_names();
    let point_labels: Vec<String> = labels.values().into_iter().map(str::to_string).collect();
    let levels = labels.levels().to_vec();

    let plot = if k == 2 {
        Plot::Scatter {
            title,
            dimensions,
            coordinates,
            labels: point_labels,
            levels,
        }
    } else {
        Plot::PairsMatrix {
            title,
            dimensions,
            coordinates,
            labels: point_labels,
            levels,
        }
    };

    info!("Rendered {} for {} sample(s)", plot.kind(), data.n_samples());
    Ok(plot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use histo_features::Labels;
    use ndarray::Array2;

    fn labelled(n: usize, p: usize) -> FeatureLabelSet {
        let x = Array2::from_shape_fn((n, p), |(i, j)| ((i * 3 + j * 7) % 11) as f64 + (i * j) as f64 * 0.1);
        let values: Vec<&str> = (0..n).map(|i| if i % 2 == 0 { "A" } else { "B" }).collect();
        FeatureLabelSet::from_matrix(x, Some(Labels::from_values(&values))).unwrap()
    }

    #[test]
    fn test_two_dimensions_scatter() {
        let plot = visualize(&labelled(12, 5), 2, ReductionMethod::Pca).unwrap();
        assert_eq!(plot.kind(), "scatter");
    }

    #[test]
    fn test_more_dimensions_pairs_matrix() {
        let plot = visualize(&labelled(12, 5), 4, ReductionMethod::Pca).unwrap();
        match plot {
            Plot::PairsMatrix { dimensions, coordinates, .. } => {
                assert_eq!(dimensions.len(), 4);
                assert_eq!(coordinates.ncols(), 4);
            }
            other => panic!("expected pairs matrix, got {}", other.kind()),
        }
    }

    #[test]
    fn test_out_of_range_dimensions() {
        for k in [0, 1, 11] {
            let err = visualize(&labelled(12, 5), k, ReductionMethod::Pca).unwrap_err();
            assert_eq!(err.error_code(), "INVALID_DIMENSION");
        }
    }

    #[test]
    fn test_dimensions_clipped_to_feature_count() {
        let plot = visualize(&labelled(12, 3), 6, ReductionMethod::Pca).unwrap();
        assert_eq!(plot.kind(), "pairs_matrix");
    }

    #[test]
    fn test_single_feature_cannot_be_plotted() {
        let err = visualize(&labelled(12, 1), 2, ReductionMethod::Pca).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_DIMENSION");
    }

    #[test]
    fn test_labels_required() {
        let unlabeled = FeatureLabelSet::from_matrix(Array2::ones((4, 3)), None).unwrap();
        let err = visualize(&unlabeled, 2, ReductionMethod::Pca).unwrap_err();
        assert_eq!(err.error_code(), "MISSING_REQUIRED_LABEL");
    }
}
