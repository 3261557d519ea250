use crate::header::RawHeader;
use crate::types::{DataType, RescaleParams};
use crate::volume::CanonicalVolume;
use nalgebra::Matrix4;

pub fn print_header(header: &RawHeader) {
    print_field("Description", Some(&header.description).filter(|d| !d.is_empty()));
    println!("{:20}: {}", "Magic", header.magic);

    let rank = usize::try_from(header.dims[0].clamp(1, 7)).unwrap_or(3);
    let dims: Vec<String> = header.dims[1..=rank].iter().map(ToString::to_string).collect();
    println!("{:20}: {} [rank {}]", "Dimensions", dims.join("x"), header.dims[0]);

    let spacing: Vec<String> = header.pix_dims[1..=3].iter().map(|p| format!("{p:.4}")).collect();
    println!("{:20}: {} (qfac {})", "Voxel Spacing", spacing.join(" x "), header.pix_dims[0]);

    print_datatype(header);
    println!(
        "{:20}: {}",
        "Rescale",
        RescaleParams::new(header.scl_slope, header.scl_inter)
    );
    println!("{:20}: qform {}, sform {}", "Form Codes", header.qform_code, header.sform_code);
    if header.intent_code != 0 {
        println!("{:20}: {}", "Intent Code", header.intent_code);
    }
    println!(
        "{:20}: {}",
        "Byte Order",
        if header.little_endian { "little endian" } else { "big endian" }
    );
    print_matrix("Affine", &header.affine_matrix());

    println!();
}

pub fn print_volume(volume: &CanonicalVolume) {
    let orientation = volume.orientation();
    let oblique = volume.oblique();
    let intensity = volume.intensity();

    print_field("Name", Some(&volume.properties().name).filter(|n| !n.is_empty()));
    println!("{:20}: {}", "Id", volume.id());
    println!("{:20}: {} x {}", "Voxels", volume.voxels().kind(), volume.voxels().len());
    if volume.frame_count() > 1 {
        println!("{:20}: {}", "Frames", volume.frame_count());
    }

    let [_, x, y, z] = orientation.dims_ras;
    println!("{:20}: {x}x{y}x{z}", "RAS Dimensions");
    let [_, px, py, pz] = orientation.pix_dims_ras;
    println!("{:20}: {px:.4} x {py:.4} x {pz:.4}", "RAS Spacing");
    println!("{:20}: {:?}", "Permutation", orientation.perm_ras);
    print_matrix("RAS Affine", &orientation.mat_ras);

    println!("{:20}: {:.4} deg", "Oblique Angle", oblique.oblique_angle);
    println!("{:20}: {:.4} deg", "Max Shear", oblique.max_shear_deg);
    let (lo, hi) = (&oblique.extents_min_ortho, &oblique.extents_max_ortho);
    println!(
        "{:20}: [{:.2}, {:.2}, {:.2}] .. [{:.2}, {:.2}, {:.2}]",
        "Ortho Extents", lo.x, lo.y, lo.z, hi.x, hi.y, hi.z
    );

    println!("{:20}: {:.4} .. {:.4}", "Display Range", intensity.cal_min, intensity.cal_max);
    println!("{:20}: {:.4} .. {:.4}", "Global Range", intensity.global_min, intensity.global_max);

    for diagnostic in volume.diagnostics() {
        println!("{:20}: {}", "Warning", diagnostic);
    }

    println!();
}

fn print_field(name: &str, value: Option<&String>) {
    if let Some(v) = value {
        println!("{name:20}: {v}");
    }
}

fn print_datatype(header: &RawHeader) {
    match DataType::from_code(header.datatype_code) {
        Ok(datatype) => println!(
            "{:20}: {} [{} bits]",
            "Datatype", datatype, header.num_bits_per_voxel
        ),
        Err(_) => println!(
            "{:20}: unsupported ({}) [{} bits]",
            "Datatype", header.datatype_code, header.num_bits_per_voxel
        ),
    }
}

fn print_matrix(name: &str, mtx: &Matrix4<f64>) {
    for row in 0..3 {
        let label = if row == 0 { name } else { "" };
        println!(
            "{label:20}{sep} [{:10.4} {:10.4} {:10.4} {:10.4}]",
            mtx[(row, 0)],
            mtx[(row, 1)],
            mtx[(row, 2)],
            mtx[(row, 3)],
            sep = if row == 0 { ":" } else { " " },
        );
    }
}
