use std::borrow::Cow;

use pcd_core::pointcloud::point::{PointCloud, SYNTHETIC};

use crate::{
    config::{DonorAlignment, PatchworkConfig},
    error::PatchworkError,
    patch::PatchGrid,
    selection::select_points,
    table::PatchTable,
    tile::{point_cloud_tile_origin, TileOrigin},
};

/// Donor points lying in patches where the recipient has no point of its class list.
pub fn resolve_complementary_points(
    recipient: &PointCloud,
    donors: &[PointCloud],
    config: &PatchworkConfig,
) -> Result<PatchTable, PatchworkError> {
    config.validate()?;
    let origin = point_cloud_tile_origin(recipient, config.tile_size)?;
    let grid = PatchGrid::from_config(origin, config)?;

    let recipient_extras = if config.recipient_use_synthetic_points {
        Vec::new()
    } else {
        vec![SYNTHETIC.to_string()]
    };
    let recipient_counts = select_points(
        recipient,
        &grid,
        &config.recipient_class_list,
        config.recipient_use_synthetic_points,
        &recipient_extras,
    )?
    .counts_by_patch();

    let mut donor_tables = Vec::with_capacity(donors.len());
    for donor in donors {
        if donor.is_empty() {
            continue;
        }
        let donor = align_donor(donor, recipient, origin, config)?;
        donor_tables.push(select_points(
            &donor,
            &grid,
            &config.donor_class_list,
            config.donor_use_synthetic_points,
            &donor.field_names(),
        )?);
    }

    let mut table = if donor_tables.is_empty() {
        PatchTable::empty_with_coordinates()
    } else {
        PatchTable::concat(donor_tables)
    };
    let donor_points = table.len();
    table.retain(|row| recipient_counts.get(&row.patch).copied().unwrap_or(0) == 0);

    log::debug!(
        "{} of {} donor points fall in patches empty in the recipient ({} occupied patches)",
        table.len(),
        donor_points,
        recipient_counts.len()
    );
    Ok(table)
}

fn align_donor<'a>(
    donor: &'a PointCloud,
    recipient: &PointCloud,
    origin: TileOrigin,
    config: &PatchworkConfig,
) -> Result<Cow<'a, PointCloud>, PatchworkError> {
    match config.donor_alignment {
        DonorAlignment::Verify => {
            let donor_origin = point_cloud_tile_origin(donor, config.tile_size)?;
            if donor_origin != origin {
                return Err(PatchworkError::TileMismatch {
                    recipient: origin,
                    donor: donor_origin,
                    recipient_path: recipient.metadata.path.clone(),
                    donor_path: donor.metadata.path.clone(),
                });
            }
            Ok(Cow::Borrowed(donor))
        }
        DonorAlignment::Crop => {
            let cropped = donor.filtered(|point| origin.contains(point.x, point.y, config.tile_size));
            if cropped.len() < donor.len() {
                log::debug!(
                    "dropped {} donor points outside tile {}",
                    donor.len() - cropped.len(),
                    origin
                );
            }
            Ok(Cow::Owned(cropped))
        }
    }
}

#[cfg(test)]
mod tests {
    use pcd_core::pointcloud::point::Point;

    use super::*;
    use crate::patch::PatchCoord;

    fn config() -> PatchworkConfig {
        PatchworkConfig {
            tile_size: 3.0,
            patch_size: 1.0,
            donor_class_list: vec![2, 9],
            recipient_class_list: vec![2, 3, 9],
            ..Default::default()
        }
    }

    fn cloud(points: &[(f64, f64, u8)], attribute: &str) -> PointCloud {
        let points = points
            .iter()
            .map(|(x, y, class)| {
                let mut point = Point::new(*x, *y, 1.0, *class);
                point.attributes = vec![x * 10.0];
                point
            })
            .collect();
        PointCloud::new(points, vec![attribute.to_string()])
    }

    // Recipient covers the north row of a 3x3 tile whose origin is (0, 3).
    fn recipient() -> PointCloud {
        cloud(
            &[(0.5, 2.5, 2), (1.5, 2.5, 3), (2.5, 2.5, 9), (0.0, 0.0, 6), (3.0, 3.0, 2)],
            "intensity",
        )
    }

    #[test]
    fn test_complementary_points() {
        let donor = cloud(
            &[(0.5, 2.2, 2), (0.5, 1.5, 2), (2.5, 0.5, 9), (1.5, 1.5, 5), (0.2, 0.2, 9)],
            "intensity",
        );
        let table = resolve_complementary_points(&recipient(), &[donor], &config()).unwrap();

        let patches: Vec<PatchCoord> = table.rows.iter().map(|row| row.patch).collect();
        assert_eq!(
            patches,
            vec![PatchCoord::new(0, 1), PatchCoord::new(2, 2), PatchCoord::new(0, 2)]
        );
        assert_eq!(
            table.column_names(),
            vec!["x", "y", "z", "synthetic", "intensity", "patch_x", "patch_y", "classification"]
        );
        assert_eq!(table.value(&table.rows[1], "intensity"), Some(25.0));
    }

    #[test]
    fn test_never_returns_points_in_occupied_patches() {
        let recipient = recipient();
        let donor = cloud(
            &[(0.1, 2.9, 2), (2.9, 2.1, 9), (1.0, 2.0, 2), (3.0, 0.0, 2)],
            "intensity",
        );
        let table = resolve_complementary_points(&recipient, &[donor], &config()).unwrap();

        let grid = PatchGrid::new(TileOrigin::new(0.0, 3.0), 3.0, 1.0).unwrap();
        let occupied: Vec<PatchCoord> = recipient
            .points
            .iter()
            .filter(|point| config().recipient_class_list.contains(&point.classification))
            .map(|point| grid.locate(point.x, point.y).unwrap())
            .collect();
        assert!(!table.is_empty());
        assert!(table.rows.iter().all(|row| !occupied.contains(&row.patch)));
    }

    #[test]
    fn test_no_donor() {
        let table = resolve_complementary_points(&recipient(), &[], &config()).unwrap();
        assert!(table.is_empty());
        assert_eq!(
            table.column_names(),
            vec!["x", "y", "z", "patch_x", "patch_y", "classification"]
        );

        let empty = PointCloud::new(Vec::new(), Vec::new());
        let table = resolve_complementary_points(&recipient(), &[empty], &config()).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.columns, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_several_donors_union_columns() {
        let first = cloud(&[(0.5, 0.5, 2)], "intensity");
        let second = cloud(&[(1.5, 0.5, 9)], "amplitude");
        let table = resolve_complementary_points(&recipient(), &[first, second], &config()).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.column(SYNTHETIC), Some(3));
        assert_eq!(table.value(&table.rows[0], "amplitude"), Some(0.0));
        assert_eq!(table.value(&table.rows[1], "amplitude"), Some(15.0));
        assert_eq!(table.value(&table.rows[1], "intensity"), Some(0.0));
    }

    #[test]
    fn test_donor_on_another_tile() {
        let donor = cloud(&[(4.5, 0.5, 2)], "intensity");
        let result = resolve_complementary_points(&recipient(), &[donor], &config());
        assert!(matches!(
            result,
            Err(PatchworkError::TileMismatch { donor, donor_path: None, .. })
                if donor == TileOrigin::new(3.0, 3.0)
        ));
    }

    #[test]
    fn test_mismatch_names_the_donor_file() {
        let recipient = recipient().with_path("recipient.las".into());
        let first = cloud(&[(0.5, 0.5, 2)], "intensity").with_path("first.las".into());
        let second = cloud(&[(4.5, 0.5, 2)], "intensity").with_path("second.las".into());

        let error = resolve_complementary_points(&recipient, &[first, second], &config())
            .unwrap_err();
        let message = error.to_string();
        assert!(message.contains("second.las"), "{}", message);
        assert!(message.contains("recipient.las"), "{}", message);
        assert!(!message.contains("first.las"), "{}", message);
    }

    #[test]
    fn test_invalid_sizes_are_rejected() {
        for (tile_size, patch_size) in [(3.0, 10.0), (3.0, 0.0)] {
            let config = PatchworkConfig {
                tile_size,
                patch_size,
                ..config()
            };
            let result = resolve_complementary_points(&recipient(), &[], &config);
            assert!(matches!(result, Err(PatchworkError::InvalidConfig(_))));
        }
    }

    #[test]
    fn test_crop_donor() {
        let donor = cloud(&[(4.5, 0.5, 2), (0.5, 0.5, 2), (1.5, -2.0, 9)], "intensity");
        let config = PatchworkConfig {
            donor_alignment: DonorAlignment::Crop,
            ..config()
        };
        let table = resolve_complementary_points(&recipient(), &[donor], &config).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows[0].patch, PatchCoord::new(0, 2));
    }

    #[test]
    fn test_recipient_synthetic_points_ignored() {
        let mut recipient = recipient();
        recipient.points[0].synthetic = true;
        let donor = cloud(&[(0.5, 2.5, 2)], "intensity");

        let table =
            resolve_complementary_points(&recipient, &[donor.clone()], &config()).unwrap();
        assert!(table.is_empty());

        let config = PatchworkConfig {
            recipient_use_synthetic_points: false,
            ..config()
        };
        let table = resolve_complementary_points(&recipient, &[donor], &config).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_empty_recipient() {
        let empty = PointCloud::new(Vec::new(), Vec::new());
        let result = resolve_complementary_points(&empty, &[recipient()], &config());
        assert!(matches!(result, Err(PatchworkError::EmptyInput(None))));
    }
}
