// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See acoompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

use std::sync::Arc;

use epkg::{
    AssemblyInfo, BondingWire, Component, ConnObj, CoordUnit, Layout, LookupTable1D, LossPower,
    MatProp, MatPropKind, Material, MaterialType, Shape, StackupLayer, Temperature,
};
use geom::{FPoint3, Point2, Polygon};
use ptmodel::network::{
    PrismStackupThermalNetworkBuilder, PrismThermalNetworkBuilder, ThermalNetworkBuilder,
};
use ptmodel::prism::{VerticalLink, BOT, TOP};
use ptmodel::solver::ThermalNetworkStaticSolver;
use ptmodel::{
    create_layer_stackup_model, create_prism_stackup_thermal_model, create_prism_thermal_model,
    BcType, PrismModelExtractionSettings, PrismStackupThermalNetworkStaticSolver,
    PrismThermalNetworkStaticSolver, PrismThermalSimulation, SimulationSetup,
};

use log::info;

// Utilidades para tests ------------------

macro_rules! assert_almost_eq {
    ($a:expr, $b:expr) => {
        assert_almost_eq!($a, $b, 0.001)
    };
    ($a:expr, $b:expr, $c:expr) => {
        if ($a - $b).abs() > $c {
            panic!(
                "assertion failed: `abs(left - right) < {}`, (left: `{}`, right: `{}`)",
                $c, $a, $b
            );
        }
    };
}

// Inicialización para los tests
// El logger solo se activa si es un test y emite diagnósticos si el test falla
// Se debe llamar a esta función al principio de cada test
fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const ENV_T_K: f64 = 298.15;

struct Mats {
    cu: usize,
    sic: usize,
    solder: usize,
    #[allow(dead_code)]
    air: usize,
}

fn setup_materials(layout: &mut Layout) -> Mats {
    let cu = layout.materials.add_material(
        Material::new("Cu")
            .with_property(MatPropKind::ThermalConductivity, MatProp::Value(400.0))
            .with_property(MatPropKind::SpecificHeat, MatProp::Value(385.0))
            .with_property(MatPropKind::MassDensity, MatProp::Value(8850.0))
            .with_property(MatPropKind::Resistivity, MatProp::Value(1.7e-8)),
    );
    let sic = layout.materials.add_material(
        Material::new("SiC")
            .with_property(MatPropKind::ThermalConductivity, MatProp::Value(370.0))
            .with_property(MatPropKind::SpecificHeat, MatProp::Value(750.0))
            .with_property(MatPropKind::MassDensity, MatProp::Value(3210.0)),
    );
    let solder = layout.materials.add_material(
        Material::new("Solder")
            .with_property(MatPropKind::ThermalConductivity, MatProp::Value(55.0))
            .with_property(MatPropKind::SpecificHeat, MatProp::Value(218.0))
            .with_property(MatPropKind::MassDensity, MatProp::Value(7800.0))
            .with_property(MatPropKind::Resistivity, MatProp::Value(11.4e-8)),
    );
    let air = layout.materials.add_material(
        Material::new("Air")
            .with_type(MaterialType::Fluid)
            .with_property(MatPropKind::ThermalConductivity, MatProp::Value(0.026))
            .with_property(MatPropKind::SpecificHeat, MatProp::Value(1003.0))
            .with_property(MatPropKind::MassDensity, MatProp::Value(1.225)),
    );
    Mats {
        cu,
        sic,
        solder,
        air,
    }
}

fn rect(cu: &CoordUnit, x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon {
    vec![
        Point2::new(cu.to_coord(x0), cu.to_coord(y0)),
        Point2::new(cu.to_coord(x1), cu.to_coord(y0)),
        Point2::new(cu.to_coord(x1), cu.to_coord(y1)),
        Point2::new(cu.to_coord(x0), cu.to_coord(y1)),
    ]
}

/// Placa cuadrada de cobre de `size` mm de lado y `thickness` mm de espesor
fn board_layout(size: f64, thickness: f64) -> (Layout, Mats) {
    let cu = CoordUnit::default();
    let boundary = rect(&cu, 0.0, 0.0, size, size);
    let mut layout = Layout::new("board", cu, boundary);
    let mats = setup_materials(&mut layout);
    let cu_mat = Some(mats.cu);
    layout.add_layer(StackupLayer {
        name: "TOP".into(),
        elevation: thickness,
        thickness,
        conducting_mat: cu_mat,
        dielectric_mat: cu_mat,
    });
    (layout, mats)
}

/// Añade un dado cuadrado centrado con potencia constante opcional
fn add_die(layout: &mut Layout, mats: &Mats, x0: f64, size: f64, height: f64, power: Option<f64>) {
    let cu = layout.coord_unit;
    let loss_power = power.map(|p| {
        let lut = layout.add_power_lut(LookupTable1D::new(vec![ENV_T_K], vec![p]));
        LossPower { scenario: 0, lut }
    });
    layout.add_component(Component {
        name: "die".into(),
        boundary: Shape::Polygon(rect(&cu, x0, x0, x0 + size, x0 + size)),
        material: Some(mats.sic),
        height,
        assembly_layer: 0,
        assembly: AssemblyInfo {
            solder_material: Some(mats.solder),
            solder_filling_material: Some(mats.solder),
            solder_thickness: 0.0,
        },
        loss_power,
        black_box: true,
    });
}

fn extraction_settings() -> PrismModelExtractionSettings {
    let mut settings = PrismModelExtractionSettings::default();
    // rebanado sin bisección para mallas deterministas en los tests
    settings.layer_settings.layer_transition_ratio = 1.0;
    settings.mesh_settings.min_alpha = 15.0;
    settings.mesh_settings.min_len = 0.1;
    settings.mesh_settings.max_len = 20.0;
    settings.mesh_settings.tolerance = 0.0;
    settings.mesh_settings.max_iter = 10_000;
    settings
}

/// Placa de 100×100 con dado de 50×50 y 20 W (escenario S2)
fn die_board() -> (Layout, Mats) {
    let (mut layout, mats) = board_layout(100.0, 0.3);
    add_die(&mut layout, &mats, 25.0, 50.0, 0.5, Some(20.0));
    (layout, mats)
}

// --------------

#[test]
fn estacionario_uniforme_s1() {
    init();
    let (layout, _mats) = board_layout(100.0, 0.3);
    let mut settings = extraction_settings();
    settings.bc_settings.set_top_uniform_bc(BcType::Htc, 100.0);
    settings.bc_settings.set_bot_uniform_bc(BcType::Htc, 100.0);
    let model = create_prism_thermal_model(&layout, settings).unwrap();
    assert!(model.total_prism_elements() > 0);

    let mut solver = PrismThermalNetworkStaticSolver::new(&model, &layout);
    solver.settings.env_t = Temperature::celsius(25.0);
    let mut temps = Vec::new();
    let [tmin, tmax] = solver.solve(&mut temps);
    info!("S1: tmin {}, tmax {}", tmin, tmax);
    // sin potencia, todo el campo queda a la temperatura ambiente
    assert_almost_eq!(tmin, 25.0, 1e-3);
    assert_almost_eq!(tmax, 25.0, 1e-3);
}

#[test]
fn balance_de_energia_s2() {
    init();
    let (layout, _mats) = die_board();
    let mut settings = extraction_settings();
    settings.bc_settings.set_top_uniform_bc(BcType::Htc, 100.0);
    settings.bc_settings.set_bot_uniform_bc(BcType::Htc, 100.0);
    let model = create_prism_thermal_model(&layout, settings).unwrap();

    let builder = PrismThermalNetworkBuilder::new(&model, &layout, 1);
    let mut solver = ThermalNetworkStaticSolver::new(Default::default());
    solver.settings.env_t = Temperature::kelvin(ENV_T_K);
    let (results, _residual, iterations) = solver.solve(&builder);
    // materiales constantes: el sistema es lineal y basta una pasada
    assert_eq!(iterations, 1);

    let (network, summary) = builder.build(&results);
    // toda la potencia del dado entra en el modelo
    assert_almost_eq!(summary.i_heat_flow, 20.0, 0.2);
    // balance: lo evacuado por película iguala lo inyectado
    let outflow: f64 = network
        .nodes()
        .iter()
        .zip(&results)
        .map(|(node, t)| node.htc * (t - ENV_T_K))
        .sum();
    assert_almost_eq!(outflow, 20.0, 0.4);

    let tmax = results.iter().copied().fold(f64::MIN, f64::max);
    let tmin = results.iter().copied().fold(f64::MAX, f64::min);
    info!("S2: tmin {} K, tmax {} K", tmin, tmax);
    // estimación agrupada: ΔT medio = 20 / (0.02 m² · 100) = 10 K
    assert!(tmax > ENV_T_K + 5.0 && tmax < ENV_T_K + 100.0);
    assert!(tmin >= ENV_T_K - 1e-6);
}

#[test]
fn temperatura_impuesta_s3() {
    init();
    let (layout, _mats) = die_board();
    let mut settings = extraction_settings();
    settings
        .bc_settings
        .set_bot_uniform_bc(BcType::Temperature, ENV_T_K);
    let model = create_prism_thermal_model(&layout, settings).unwrap();

    let builder = PrismThermalNetworkBuilder::new(&model, &layout, 1);
    let mut solver = ThermalNetworkStaticSolver::new(Default::default());
    solver.settings.env_t = Temperature::kelvin(ENV_T_K);
    let (results, _residual, _iterations) = solver.solve(&builder);

    let (network, summary) = builder.build(&results);
    // tantos nodos fijos como prismas con la cara inferior expuesta
    let bot_layer = model.total_layers() - 1;
    let expected_fixed = model.get_layer(bot_layer).total_elements();
    assert_eq!(summary.fixed_t_nodes, expected_fixed);
    let fixed_count = network.nodes().iter().filter(|n| n.t.is_some()).count();
    assert_eq!(fixed_count, expected_fixed);

    let tmax = results.iter().copied().fold(f64::MIN, f64::max);
    let tmin = results.iter().copied().fold(f64::MAX, f64::min);
    info!("S3: tmin {} K, tmax {} K", tmin, tmax);
    // el dado queda por encima de la placa fría; con estos materiales el
    // salto es de centésimas de Kelvin
    assert!(tmax > ENV_T_K + 1e-4);
    assert_almost_eq!(tmin, ENV_T_K, 1e-6);
}

#[test]
fn biseccion_de_rebanadas_s4() {
    init();
    // tres láminas de cobre apiladas de 1, 0.05 y 1 mm
    let cu = CoordUnit::default();
    let boundary = rect(&cu, 0.0, 0.0, 10.0, 10.0);
    let mut layout = Layout::new("slabs", cu, boundary);
    let mats = setup_materials(&mut layout);
    let cu_mat = Some(mats.cu);
    layout.add_layer(StackupLayer {
        name: "L1".into(),
        elevation: 2.05,
        thickness: 1.0,
        conducting_mat: cu_mat,
        dielectric_mat: cu_mat,
    });
    layout.add_layer(StackupLayer {
        name: "L2".into(),
        elevation: 1.05,
        thickness: 0.05,
        conducting_mat: cu_mat,
        dielectric_mat: cu_mat,
    });
    layout.add_layer(StackupLayer {
        name: "L3".into(),
        elevation: 1.0,
        thickness: 1.0,
        conducting_mat: cu_mat,
        dielectric_mat: cu_mat,
    });

    let mut layer_settings = extraction_settings().layer_settings;
    layer_settings.layer_transition_ratio = 2.0;
    let stackup = create_layer_stackup_model(&layout, layer_settings).unwrap();

    let thicknesses: Vec<f64> = (0..stackup.total_layers())
        .map(|layer| stackup.layer_height_thickness(layer).unwrap().1)
        .collect();
    info!("S4: espesores {:?}", thicknesses);
    // la lámina fina sobrevive intacta
    assert!(thicknesses.iter().any(|t| (t - 0.05).abs() < 1e-9));
    // ninguna pareja adyacente supera el cociente de transición
    for w in thicknesses.windows(2) {
        assert!(w[0] / w[1] <= 2.0 + 1e-9);
        assert!(w[1] / w[0] <= 2.0 + 1e-9);
    }
    // el apilado completo conserva su espesor
    let total: f64 = thicknesses.iter().sum();
    assert_almost_eq!(total, 2.05, 1e-9);
}

#[test]
fn calentamiento_joule_s5() {
    init();
    let (mut layout, mats) = board_layout(10.0, 0.3);
    let cu = layout.coord_unit;
    layout.add_conn_obj(ConnObj::BondingWire(BondingWire {
        net: None,
        material: Some(mats.cu),
        radius: 0.1,
        current: 10.0,
        scenario: Some(0),
        start: (cu.to_coord_point(&geom::FPoint2::new(2.0, 5.0)), 0.5),
        end: (cu.to_coord_point(&geom::FPoint2::new(8.0, 5.0)), 0.5),
        loop_height: 0.0,
        start_joint: None,
        end_joint: None,
    }));
    let mut settings = extraction_settings();
    settings.mesh_settings.max_len = 3.0;
    settings.bc_settings.set_top_uniform_bc(BcType::Htc, 100.0);
    settings.bc_settings.set_bot_uniform_bc(BcType::Htc, 100.0);
    let model = create_prism_thermal_model(&layout, settings).unwrap();
    // el muestreo mínimo del hilo produce diez segmentos encadenados
    assert_eq!(model.total_line_elements(), 10);

    let builder = PrismThermalNetworkBuilder::new(&model, &layout, 1);
    let ini = vec![ENV_T_K; model.total_elements()];
    let (_network, summary) = builder.build(&ini);
    // P = ρ_el · L · I² / (π r²) con L = 6 mm y r = 0.1 mm
    let expected = 1.7e-8 * 6.0e-3 * 100.0 / (std::f64::consts::PI * 1e-8);
    info!("S5: calor Joule {} W (esperado {})", summary.joule_heat, expected);
    assert_almost_eq!(summary.joule_heat, expected, expected * 1e-3);

    let mut solver = PrismThermalNetworkStaticSolver::new(&model, &layout);
    solver.settings.env_t = Temperature::kelvin(ENV_T_K);
    let mut temps = Vec::new();
    let [tmin, tmax] = solver.solve(&mut temps);
    assert!(tmax > tmin);
    assert!(tmax > ENV_T_K);
}

#[test]
fn comparticion_de_plantillas_s6() {
    init();
    let (layout, _mats) = die_board();
    let settings = extraction_settings();

    // rebanadas con la misma lista de polígonos comparten puntero
    let stackup = create_layer_stackup_model(&layout, settings.layer_settings.clone()).unwrap();
    assert_eq!(stackup.total_layers(), 4);
    assert!(Arc::ptr_eq(
        &stackup.layer_polygon_ids(0),
        &stackup.layer_polygon_ids(1)
    ));
    assert!(Arc::ptr_eq(
        &stackup.layer_polygon_ids(1),
        &stackup.layer_polygon_ids(2)
    ));
    assert!(!Arc::ptr_eq(
        &stackup.layer_polygon_ids(2),
        &stackup.layer_polygon_ids(3)
    ));

    // y las capas correspondientes comparten triangulación
    let model = create_prism_stackup_thermal_model(&layout, settings).unwrap();
    assert_eq!(model.layer_template_index(0), model.layer_template_index(1));
    assert_eq!(model.layer_template_index(1), model.layer_template_index(2));
    assert_ne!(model.layer_template_index(2), model.layer_template_index(3));
}

#[test]
fn biyeccion_de_indices() {
    init();
    let (layout, _mats) = die_board();
    let model = create_prism_thermal_model(&layout, extraction_settings()).unwrap();
    for gid in 0..model.total_prism_elements() {
        let (layer, element) = model.prism_local_index(gid);
        assert_eq!(model.global_index(layer, element), gid);
    }
}

#[test]
fn simetria_de_vecindad() {
    init();
    let (layout, _mats) = die_board();
    let model = create_prism_thermal_model(&layout, extraction_settings()).unwrap();
    for (gid, prism) in model.prisms().iter().enumerate() {
        for nb in prism.neighbors.iter().flatten() {
            let back = model.get_prism(*nb);
            assert!(
                back.neighbors.iter().flatten().any(|&g| g == gid),
                "vecindad lateral asimétrica entre {} y {}",
                gid,
                nb
            );
        }
        if let VerticalLink::Element(top) = prism.top {
            assert_eq!(model.get_prism(top).bot, VerticalLink::Element(gid));
        }
        if let VerticalLink::Element(bot) = prism.bot {
            assert_eq!(model.get_prism(bot).top, VerticalLink::Element(gid));
        }
    }
}

#[test]
fn conservacion_de_contactos() {
    init();
    let (layout, _mats) = die_board();
    let model = create_prism_stackup_thermal_model(&layout, extraction_settings()).unwrap();

    let prism_area = |gid: usize| {
        let prism = model.get_prism(gid);
        let tid = model.get_prism_element(prism.layer, prism.element).template_id;
        model.layer_template(prism.layer).triangle_area(tid)
    };

    let mut total_contacts = 0;
    for (gid, prism) in model.prisms().iter().enumerate() {
        for face in [TOP, BOT].iter() {
            let sum: f64 = prism.contacts[*face].iter().map(|c| c.ratio).sum();
            assert!(sum >= 0.0 && sum <= 1.0 + 1e-6, "Σ ratio fuera de rango");
            for contact in &prism.contacts[*face] {
                total_contacts += 1;
                let other = model.get_prism(contact.id);
                let back_face = if *face == TOP { BOT } else { TOP };
                let back = other.contacts[back_face]
                    .iter()
                    .find(|c| c.id == gid)
                    .expect("contacto sin simétrico");
                // la misma área de intersección vista desde ambos prismas
                let a1 = contact.ratio * prism_area(gid);
                let a2 = back.ratio * prism_area(contact.id);
                assert_almost_eq!(a1, a2, 1e-6 * a1.max(a2).max(1.0));
            }
        }
    }
    assert!(total_contacts > 0, "el modelo de apilado no tiene contactos");
}

#[test]
fn solucion_pasiva_con_t_fija() {
    init();
    let (layout, _mats) = board_layout(20.0, 0.3);
    let mut settings = extraction_settings();
    settings
        .bc_settings
        .set_bot_uniform_bc(BcType::Temperature, 310.0);
    let model = create_prism_thermal_model(&layout, settings).unwrap();

    let mut solver = PrismThermalNetworkStaticSolver::new(&model, &layout);
    solver.settings.env_t = Temperature::kelvin(ENV_T_K);
    let mut temps = Vec::new();
    let [tmin, tmax] = solver.solve(&mut temps);
    // sin potencia, todo nodo alcanzable queda a la temperatura impuesta
    assert_almost_eq!(tmin, 310.0, 1e-6);
    assert_almost_eq!(tmax, 310.0, 1e-6);
}

#[test]
fn iteracion_dependiente_de_temperatura() {
    init();
    let cu_unit = CoordUnit::default();
    let boundary = rect(&cu_unit, 0.0, 0.0, 50.0, 50.0);
    let mut layout = Layout::new("board", cu_unit, boundary);
    // cobre con conductividad polinómica en T
    let cu = layout.materials.add_material(
        Material::new("Cu")
            .with_property(
                MatPropKind::ThermalConductivity,
                MatProp::Polynomial(vec![vec![437.6, -0.165, 1.825e-4]]),
            )
            .with_property(MatPropKind::SpecificHeat, MatProp::Value(385.0))
            .with_property(MatPropKind::MassDensity, MatProp::Value(8850.0)),
    );
    let sic = layout.materials.add_material(
        Material::new("SiC")
            .with_property(MatPropKind::ThermalConductivity, MatProp::Value(370.0))
            .with_property(MatPropKind::SpecificHeat, MatProp::Value(750.0))
            .with_property(MatPropKind::MassDensity, MatProp::Value(3210.0)),
    );
    layout.add_layer(StackupLayer {
        name: "TOP".into(),
        elevation: 0.3,
        thickness: 0.3,
        conducting_mat: Some(cu),
        dielectric_mat: Some(cu),
    });
    let lut = layout.add_power_lut(LookupTable1D::new(vec![ENV_T_K], vec![10.0]));
    layout.add_component(Component {
        name: "die".into(),
        boundary: Shape::Polygon(rect(&cu_unit, 15.0, 15.0, 35.0, 35.0)),
        material: Some(sic),
        height: 0.5,
        assembly_layer: 0,
        assembly: AssemblyInfo::default(),
        loss_power: Some(LossPower { scenario: 0, lut }),
        black_box: true,
    });
    assert!(layout.is_temperature_dependent());

    let mut settings = extraction_settings();
    settings.bc_settings.set_top_uniform_bc(BcType::Htc, 500.0);
    settings.bc_settings.set_bot_uniform_bc(BcType::Htc, 500.0);
    let model = create_prism_thermal_model(&layout, settings).unwrap();

    let builder = PrismThermalNetworkBuilder::new(&model, &layout, 1);
    let mut solver = ThermalNetworkStaticSolver::new(Default::default());
    solver.settings.env_t = Temperature::kelvin(ENV_T_K);
    solver.settings.residual = 0.01;
    solver.settings.max_iter = 20;
    let (results, residual, iterations) = solver.solve(&builder);
    info!(
        "iteración P-T: {} pasadas, residuo {:.4}",
        iterations, residual
    );
    assert!(iterations >= 2);
    assert!(residual <= 0.01);
    assert!(results.iter().all(|t| t.is_finite()));
}

#[test]
fn ensamblado_paralelo_equivalente() {
    init();
    let (layout, _mats) = die_board();
    let mut settings = extraction_settings();
    settings.bc_settings.set_top_uniform_bc(BcType::Htc, 100.0);
    settings.bc_settings.set_bot_uniform_bc(BcType::Htc, 100.0);
    let model = create_prism_thermal_model(&layout, settings).unwrap();
    let ini = vec![ENV_T_K; model.total_elements()];

    let serial = PrismThermalNetworkBuilder::new(&model, &layout, 1);
    let parallel = PrismThermalNetworkBuilder::new(&model, &layout, 4);
    let (net_s, sum_s) = serial.build(&ini);
    let (net_p, sum_p) = parallel.build(&ini);

    assert_eq!(net_s.matrix_size(), net_p.matrix_size());
    assert_almost_eq!(sum_s.i_heat_flow, sum_p.i_heat_flow, 1e-9);
    for i in 0..net_s.node_size() {
        let a = net_s.node(i);
        let b = net_p.node(i);
        assert_almost_eq!(a.htc, b.htc, 1e-9);
        assert_almost_eq!(a.hf, b.hf, 1e-9);
        assert_almost_eq!(a.c, b.c, 1e-9);
        assert_eq!(a.ns.len(), b.ns.len());
        for (k, r) in &a.ns {
            let rb = b.ns.get(k).expect("arista ausente en el ensamblado paralelo");
            assert_almost_eq!(*r, *rb, 1e-9 * r.abs().max(1.0));
        }
    }
}

#[test]
fn resolucion_de_apilado() {
    init();
    let (layout, _mats) = die_board();
    let mut settings = extraction_settings();
    settings.bc_settings.set_top_uniform_bc(BcType::Htc, 100.0);
    settings.bc_settings.set_bot_uniform_bc(BcType::Htc, 100.0);
    let model = create_prism_stackup_thermal_model(&layout, settings).unwrap();

    let builder = PrismStackupThermalNetworkBuilder::new(&model, &layout, 1);
    let mut solver = ThermalNetworkStaticSolver::new(Default::default());
    solver.settings.env_t = Temperature::kelvin(ENV_T_K);
    let (results, _residual, _iterations) = solver.solve(&builder);

    let (network, summary) = builder.build(&results);
    assert_almost_eq!(summary.i_heat_flow, 20.0, 0.2);
    let outflow: f64 = network
        .nodes()
        .iter()
        .zip(&results)
        .map(|(node, t)| node.htc * (t - ENV_T_K))
        .sum();
    // balance de energía también con contactos fraccionales
    assert_almost_eq!(outflow, 20.0, 0.4);

    let mut temps = Vec::new();
    let mut static_solver = PrismStackupThermalNetworkStaticSolver::new(&model, &layout);
    static_solver.settings.env_t = Temperature::kelvin(ENV_T_K);
    let [tmin, tmax] = static_solver.solve(&mut temps);
    assert!(tmax > tmin);
    assert!(tmin >= ENV_T_K - 1e-6);
}

#[test]
fn condicion_por_bloque() {
    init();
    let (layout, _mats) = board_layout(100.0, 0.3);
    let mut settings = extraction_settings();
    settings.bc_settings.add_block_bc(
        ptmodel::Orientation::Top,
        epkg::FBox2::new(
            geom::FPoint2::new(0.0, 0.0),
            geom::FPoint2::new(50.0, 100.0),
        ),
        BcType::Htc,
        100.0,
    );
    settings.bc_settings.set_bot_uniform_bc(BcType::Htc, 100.0);
    let model = create_prism_thermal_model(&layout, settings).unwrap();

    let builder = PrismThermalNetworkBuilder::new(&model, &layout, 1);
    let ini = vec![ENV_T_K; model.total_elements()];
    let (network, summary) = builder.build(&ini);
    assert!(summary.boundary_nodes > 0);

    // solo los prismas con baricentro en la mitad izquierda reciben la
    // película del bloque además de la uniforme inferior
    let area_half = 0.05 * 0.1;
    let htc_total: f64 = network.nodes().iter().map(|n| n.htc).sum();
    let expected = 100.0 * (area_half + 0.01);
    assert_almost_eq!(htc_total, expected, expected * 0.05);
}

#[test]
fn construccion_idempotente() {
    init();
    let (layout, _mats) = die_board();
    let settings = extraction_settings();
    let stackup1 = create_layer_stackup_model(&layout, settings.layer_settings.clone()).unwrap();
    let stackup2 = create_layer_stackup_model(&layout, settings.layer_settings.clone()).unwrap();
    assert_eq!(stackup1.total_layers(), stackup2.total_layers());
    for layer in 0..stackup1.total_layers() {
        assert_eq!(
            stackup1.layer_height_thickness(layer),
            stackup2.layer_height_thickness(layer)
        );
        assert_eq!(
            *stackup1.layer_polygon_ids(layer),
            *stackup2.layer_polygon_ids(layer)
        );
    }

    let model1 = create_prism_thermal_model(&layout, settings.clone()).unwrap();
    let model2 = create_prism_thermal_model(&layout, settings).unwrap();
    assert_eq!(model1.total_prism_elements(), model2.total_prism_elements());
    assert_eq!(model1.points().len(), model2.points().len());
    for gid in 0..model1.total_prism_elements() {
        let (l1, e1) = model1.prism_local_index(gid);
        let (l2, e2) = model2.prism_local_index(gid);
        assert_eq!((l1, e1), (l2, e2));
        let a = model1.get_prism_element(l1, e1);
        let b = model2.get_prism_element(l2, e2);
        assert_eq!(a.mat_id, b.mat_id);
        assert_eq!(a.net_id, b.net_id);
    }
}

#[test]
fn simulacion_con_monitores() {
    init();
    let (layout, _mats) = die_board();
    let mut settings = extraction_settings();
    settings.bc_settings.set_top_uniform_bc(BcType::Htc, 100.0);
    settings.bc_settings.set_bot_uniform_bc(BcType::Htc, 100.0);
    let model = create_prism_thermal_model(&layout, settings).unwrap();

    let mut setup = SimulationSetup::default();
    setup.monitors = vec![FPoint3::new(50.0, 50.0, 0.75)];
    setup.solver.env_t = Temperature::kelvin(ENV_T_K);
    let simulation = PrismThermalSimulation::new(&model, &layout, setup);
    let mut temps = Vec::new();
    let [tmin, tmax] = simulation.run_static(&mut temps);
    assert_eq!(temps.len(), 1);
    assert!(temps[0] >= tmin - 1e-9 && temps[0] <= tmax + 1e-9);
    // el centro del dado es la zona más caliente del modelo
    assert!(temps[0] > ENV_T_K + 1.0);

    // el transitorio solo expone su interfaz
    assert!(simulation.run_transient(&|_, _| 1.0).is_none());
}

#[test]
fn volcados_y_archivos() {
    init();
    let (layout, _mats) = board_layout(20.0, 0.3);
    let mut settings = extraction_settings();
    settings.bc_settings.set_top_uniform_bc(BcType::Htc, 100.0);
    let model = create_prism_thermal_model(&layout, settings).unwrap();

    let dir = std::env::temp_dir();
    let vtk_path = dir.join("ptmodel_test_mesh.vtk");
    model.write_vtk(&vtk_path, None).unwrap();
    let content = std::fs::read_to_string(&vtk_path).unwrap();
    assert!(content.starts_with("# vtk DataFile Version 2.0"));
    assert!(content.contains("DATASET UNSTRUCTURED_GRID"));
    let _ = std::fs::remove_file(&vtk_path);

    // ida y vuelta por JSON y por archivo binario versionado
    let json = model.as_json().unwrap();
    let restored = ptmodel::PrismThermalModel::from_json(&json).unwrap();
    assert_eq!(restored.total_prism_elements(), model.total_prism_elements());
    assert_eq!(restored.points().len(), model.points().len());

    let bin_path = dir.join("ptmodel_test_model.bin");
    model.save_bin(&bin_path).unwrap();
    let restored = ptmodel::PrismThermalModel::load_bin(&bin_path).unwrap();
    assert_eq!(restored.total_prism_elements(), model.total_prism_elements());
    let _ = std::fs::remove_file(&bin_path);
}
