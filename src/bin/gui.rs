//! GUI application for the experiment plots.
//!
//! Run with: cargo run --features gui --bin face-age-pca-gui -- --search

use clap::Parser;
use eframe::egui::{self, Color32, Ui};
use egui_plot::{Legend, Line, LineStyle, Plot, PlotPoints, Points};
use face_age_pca::{experiment, ExperimentArgs, ExperimentConfig, Mode, ModelSelection, Report};

#[derive(Parser, Debug)]
#[command(name = "face-age-pca-gui")]
#[command(author, version, about = "Plots of the children vs adults experiment", long_about = None)]
struct Args {
    #[command(flatten)]
    experiment: ExperimentArgs,

    /// Show verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> eframe::Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = match args.experiment.to_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1024.0, 768.0]),
        ..Default::default()
    };

    eframe::run_native(
        "face-age-pca - Children vs Adults",
        options,
        Box::new(|cc| Ok(Box::new(ExperimentApp::new(cc, config)))),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    ModelSelection,
    Confusion,
    Roc,
}

struct ExperimentApp {
    config: ExperimentConfig,
    data_root: String,
    search: bool,
    components: usize,

    report: Option<Report>,
    status: String,
    tab: Tab,
}

impl ExperimentApp {
    fn new(_cc: &eframe::CreationContext<'_>, config: ExperimentConfig) -> Self {
        let (search, components) = match config.mode {
            Mode::SearchFromScratch => (true, face_age_pca::config::DEFAULT_COMPONENTS),
            Mode::UseFixedComponents(k) => (false, k),
        };
        Self {
            data_root: config.layout.root.display().to_string(),
            search,
            components,
            config,
            report: None,
            status: "Press Run to start the experiment".to_string(),
            tab: Tab::ModelSelection,
        }
    }

    fn run_experiment(&mut self) {
        self.config.layout.root = self.data_root.clone().into();
        self.config.mode = if self.search {
            Mode::SearchFromScratch
        } else {
            Mode::UseFixedComponents(self.components)
        };

        match experiment::run(&self.config) {
            Ok(report) => {
                self.status = format!(
                    "{} components, test F1 {:.4}",
                    report.components, report.test.f1
                );
                self.report = Some(report);
            }
            Err(e) => {
                self.status = format!("Experiment failed: {}", e);
            }
        }
    }
}

impl eframe::App for ExperimentApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::top("tabs").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.selectable_value(&mut self.tab, Tab::ModelSelection, "Model selection");
                ui.selectable_value(&mut self.tab, Tab::Confusion, "Confusion matrix");
                ui.selectable_value(&mut self.tab, Tab::Roc, "ROC curve");
            });
        });

        egui::SidePanel::left("controls").min_width(250.0).show(ctx, |ui| {
            ui.heading("Data");
            ui.separator();

            ui.label("Data root:");
            ui.text_edit_singleline(&mut self.data_root);
            ui.add_space(16.0);

            ui.heading("Experiment");
            ui.separator();

            ui.checkbox(&mut self.search, "Search components and sweep C");
            let pixels = (self.config.image_size * self.config.image_size) as usize;
            ui.add_enabled(
                !self.search,
                egui::Slider::new(&mut self.components, 1..=pixels).text("Components"),
            );

            if ui.button("Run").clicked() {
                self.run_experiment();
            }
            ui.add_space(16.0);

            ui.heading("Status");
            ui.separator();
            ui.label(&self.status);

            if let Some(ref report) = self.report {
                ui.add_space(8.0);
                ui.label(format!("Train accuracy: {:.4}", report.train.accuracy));
                ui.label(format!("Train F1: {:.4}", report.train.f1));
                ui.label(format!("Test accuracy: {:.4}", report.test.accuracy));
                ui.label(format!("Test F1: {:.4}", report.test.f1));
                ui.label(format!("ROC AUC: {:.4}", report.roc_auc));
            }
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            let Some(ref report) = self.report else {
                ui.centered_and_justified(|ui| {
                    ui.heading("No results yet");
                });
                return;
            };

            match self.tab {
                Tab::ModelSelection => match report.selection {
                    Some(ref selection) => model_selection_plot(ui, selection),
                    None => {
                        ui.centered_and_justified(|ui| {
                            ui.heading("Model selection runs only in search mode");
                        });
                    }
                },
                Tab::Confusion => confusion_grid(ui, report),
                Tab::Roc => roc_plot(ui, report),
            }
        });
    }
}

/// Mean cross-validated F1 against log10(C), one error bar per C.
fn model_selection_plot(ui: &mut Ui, selection: &ModelSelection) {
    let mean: PlotPoints = selection
        .points
        .iter()
        .map(|p| [p.c.log10(), p.cv.mean])
        .collect();
    let markers: PlotPoints = selection
        .points
        .iter()
        .map(|p| [p.c.log10(), p.cv.mean])
        .collect();

    let (lo, hi) = selection
        .points
        .iter()
        .map(|p| p.c.log10())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| (lo.min(x), hi.max(x)));
    let baseline: PlotPoints = vec![
        [lo, selection.baseline_test_f1],
        [hi, selection.baseline_test_f1],
    ]
    .into();

    Plot::new("model_selection")
        .legend(Legend::default())
        .x_axis_label("log10(C)")
        .y_axis_label("F1")
        .show(ui, |plot_ui| {
            plot_ui.line(
                Line::new(mean)
                    .name(format!("{} penalty (cross-validated)", selection.penalty.name()))
                    .color(Color32::LIGHT_BLUE)
                    .width(1.5),
            );
            plot_ui.points(Points::new(markers).radius(3.0).color(Color32::LIGHT_BLUE));

            for p in &selection.points {
                let x = p.c.log10();
                let bar: PlotPoints = vec![
                    [x, p.cv.mean - p.cv.std_dev],
                    [x, p.cv.mean + p.cv.std_dev],
                ]
                .into();
                plot_ui.line(Line::new(bar).color(Color32::LIGHT_BLUE).width(1.0));
            }

            plot_ui.line(
                Line::new(baseline)
                    .name("no penalty (test)")
                    .color(Color32::LIGHT_RED)
                    .style(LineStyle::dashed_dense())
                    .width(1.5),
            );
        });
}

fn confusion_grid(ui: &mut Ui, report: &Report) {
    for (title, eval) in [("Training set", &report.train), ("Test set", &report.test)] {
        ui.heading(title);
        let rows = eval.confusion.as_rows();

        egui::Grid::new(title).striped(true).min_col_width(80.0).show(ui, |ui| {
            ui.label("");
            ui.label("predicted child");
            ui.label("predicted adult");
            ui.end_row();

            for (name, row) in ["true child", "true adult"].iter().zip(rows) {
                ui.label(*name);
                ui.label(row[0].to_string());
                ui.label(row[1].to_string());
                ui.end_row();
            }
        });

        ui.label(format!("accuracy: {:.4}, f1 score: {:.4}", eval.accuracy, eval.f1));
        ui.add_space(16.0);
    }
}

fn roc_plot(ui: &mut Ui, report: &Report) {
    let curve: PlotPoints = report.roc.points().collect();
    let chance: PlotPoints = vec![[0.0, 0.0], [1.0, 1.0]].into();

    Plot::new("roc_curve")
        .legend(Legend::default())
        .x_axis_label("False positive rate")
        .y_axis_label("True positive rate")
        .data_aspect(1.0)
        .show(ui, |plot_ui| {
            plot_ui.line(
                Line::new(curve)
                    .name(format!("test (AUC = {:.3})", report.roc_auc))
                    .color(Color32::LIGHT_BLUE)
                    .width(1.5),
            );
            plot_ui.line(
                Line::new(chance)
                    .name("chance")
                    .color(Color32::GREEN)
                    .style(LineStyle::dashed_dense()),
            );
        });
}
