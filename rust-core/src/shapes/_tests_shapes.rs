#[cfg(test)]
mod _tests_shapes {
    use super::super::curves::*;
    use super::super::shape_class::{GrainShape, ShapeClass};
    use crate::orientation::{euler_to_matrix, EulerAngles};
    use approx::assert_relative_eq;
    use nalgebra::{Matrix3, Vector3};

    // Helper: lattice estimate of a shape's volume
    fn lattice_volume(shape: &GrainShape, h: f64) -> f64 {
        let reach = shape.bounding_radius() + h;
        let steps = (reach / h).ceil() as i64;
        let mut count = 0usize;
        for i in -steps..=steps {
            for j in -steps..=steps {
                for k in -steps..=steps {
                    let p = Vector3::new(i as f64 * h, j as f64 * h, k as f64 * h);
                    if shape.contains_offset(&p) {
                        count += 1;
                    }
                }
            }
        }
        count as f64 * h.powi(3)
    }

    fn make_shape(class: ShapeClass, param: f64, volume: f64) -> GrainShape {
        GrainShape {
            class,
            param,
            radii: class.radii_from_volume(volume, 0.8, 0.6, param),
            frame: Matrix3::identity(),
        }
    }

    #[test]
    fn test_sphere_omega3_is_one() {
        assert_relative_eq!(super_ellipsoid_omega3(2.0), 1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_super_ellipsoid_curve_shape() {
        let curve = super_ellipsoid_curve();
        assert_eq!(curve.len(), 40);
        assert_relative_eq!(curve[0].1, 0.25);
        assert_relative_eq!(curve[39].1, 10.0);
        assert!(curve.iter().all(|(omega, _)| omega.is_finite() && *omega > 0.0));
    }

    #[test]
    fn test_shape_parameter_lookup() {
        assert_relative_eq!(ShapeClass::SuperEllipsoid.shape_parameter_from_omega3(1.0), 2.0);
        assert_relative_eq!(ShapeClass::CubeOctahedron.shape_parameter_from_omega3(0.9621), 1.3);
        assert_relative_eq!(ShapeClass::CubeOctahedron.shape_parameter_from_omega3(0.0), 0.0);
        assert_relative_eq!(ShapeClass::Ellipsoid.shape_parameter_from_omega3(0.5), 2.0);
    }

    #[test]
    fn test_nearest_on_curve_first_match_wins() {
        let curve = [(0.5, 1.0), (0.7, 2.0), (0.7, 3.0)];
        assert_eq!(nearest_on_curve(&curve, 0.69), Some(2.0));
        assert_eq!(nearest_on_curve(&[], 0.69), None);
    }

    #[test]
    fn test_radii_follow_aspect_ratios() {
        let radii = ShapeClass::Ellipsoid.radii_from_volume(100.0, 0.5, 0.25, 2.0);
        assert_relative_eq!(radii[1], radii[0] * 0.5);
        assert_relative_eq!(radii[2], radii[0] * 0.25);
        let sphere = ShapeClass::Ellipsoid.radii_from_volume(4.0 / 3.0 * std::f64::consts::PI, 1.0, 1.0, 2.0);
        assert_relative_eq!(sphere[0], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_radii_reproduce_volume() {
        let volume = 1000.0;
        let cases = [
            (ShapeClass::Ellipsoid, 2.0),
            (ShapeClass::SuperEllipsoid, 2.0),
            (ShapeClass::SuperEllipsoid, 4.0),
            (ShapeClass::CubeOctahedron, 0.0),
            (ShapeClass::CubeOctahedron, 0.8),
            (ShapeClass::CubeOctahedron, 1.5),
            (ShapeClass::Cylinder, 0.0),
        ];
        for (class, param) in cases {
            let shape = make_shape(class, param, volume);
            let measured = lattice_volume(&shape, 0.2);
            assert!(
                (measured - volume).abs() / volume < 0.03,
                "{:?} n={} measured {}",
                class,
                param,
                measured
            );
        }
    }

    #[test]
    fn test_bounding_radius_encloses_shape() {
        let cases = [
            (ShapeClass::Ellipsoid, 2.0),
            (ShapeClass::SuperEllipsoid, 6.0),
            (ShapeClass::CubeOctahedron, 0.0),
            (ShapeClass::Cylinder, 0.0),
        ];
        for (class, param) in cases {
            let shape = GrainShape {
                class,
                param,
                radii: [2.0, 2.0, 2.0],
                frame: Matrix3::identity(),
            };
            let reach = shape.bounding_radius() * 1.01;
            let corner = Vector3::new(1.0, 1.0, 1.0).normalize() * reach;
            let edge = Vector3::new(1.0, 0.0, 1.0).normalize() * reach;
            assert!(!shape.contains_offset(&corner), "{:?}", class);
            assert!(!shape.contains_offset(&edge), "{:?}", class);
        }
    }

    #[test]
    fn test_cube_octahedron_truncation() {
        let corner = Vector3::new(0.9, 0.9, 0.9);
        assert!(ShapeClass::CubeOctahedron.contains(&corner, 0.0));
        assert!(!ShapeClass::CubeOctahedron.contains(&corner, 1.0));
        assert!(ShapeClass::CubeOctahedron.contains(&Vector3::new(1.0, 0.0, 0.0), 2.0));
        assert!(!ShapeClass::CubeOctahedron.contains(&Vector3::new(1.01, 0.0, 0.0), 0.0));
    }

    #[test]
    fn test_rotated_frame_moves_long_axis() {
        // phi1 = 90 degrees swaps the sample x and y directions
        let frame = euler_to_matrix(&EulerAngles::from_degrees(90.0, 0.0, 0.0));
        let shape = GrainShape {
            class: ShapeClass::Ellipsoid,
            param: 2.0,
            radii: [4.0, 1.0, 1.0],
            frame,
        };
        assert!(shape.contains_offset(&Vector3::new(0.0, 3.5, 0.0)));
        assert!(!shape.contains_offset(&Vector3::new(3.5, 0.0, 0.0)));
    }

    #[test]
    fn test_bounding_factors() {
        assert_relative_eq!(ShapeClass::Ellipsoid.bounding_factor(2.0), 1.0);
        assert_relative_eq!(ShapeClass::SuperEllipsoid.bounding_factor(2.0), 1.0);
        assert_relative_eq!(ShapeClass::SuperEllipsoid.bounding_factor(4.0), 3.0_f64.powf(0.25));
        assert_relative_eq!(ShapeClass::CubeOctahedron.bounding_factor(1.0), 3.0_f64.sqrt());
        assert_relative_eq!(ShapeClass::Cylinder.bounding_factor(0.0), 2.0_f64.sqrt());
    }

    #[test]
    fn test_cube_octahedron_curve_table() {
        for (i, &(omega, param)) in CUBE_OCTAHEDRON_CURVE.iter().enumerate() {
            assert_relative_eq!(param, 0.05 * i as f64, epsilon = 1e-12);
            assert!(omega > 0.75 && omega < 1.0, "omega3 {} at {}", omega, param);
        }
    }
}
