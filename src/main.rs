mod error;
mod palette;
mod placement;
mod progress;
mod room;
mod room_extractor;

use std::{
    fs,
    path::{Path, PathBuf},
    process,
};

use clap::{Args, Parser, Subcommand};
use serde_json::json;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

use error::{Result, RoomError};
use palette::PaletteDatabase;
use placement::{PlacementContext, TokenDecoder};
use room::{
    overrides::{overrides_path_for, save_overrides},
    render::RenderOptions,
    Room,
};
use room_extractor::{save_tilemap_png, RoomExtractor};

#[derive(Parser)]
#[command(name = "room_tiler")]
#[command(about = "Renders room level files into per-tile map images")]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a single room to PNG
    Render {
        room: PathBuf,
        /// Defaults to `<ROOM>.png` in the current directory
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Override file to use instead of `<ROOM>.overrides.json`
        #[arg(long)]
        overrides: Option<PathBuf>,
        #[command(flatten)]
        edits: OverrideArgs,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Render every room in a directory and write a `rooms.json` index
    Batch {
        input: PathBuf,
        #[arg(short, long, default_value = "./output/ROOMS")]
        output: PathBuf,
        #[arg(long, default_value = "./output/progress.json")]
        progress: PathBuf,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Print the shortcuts and exits of a room as JSON
    Trace { room: PathBuf },
}

#[derive(Args)]
struct CommonArgs {
    /// Palette database JSON
    #[arg(long)]
    palette: Option<PathBuf>,
    /// Render options JSON, individual flags below take precedence
    #[arg(long)]
    options: Option<PathBuf>,
    /// Hide objects filtered away for this character
    #[arg(long)]
    character: Option<String>,
    /// Region id for palette lookups, otherwise taken from the room name
    #[arg(long)]
    region: Option<String>,
    #[arg(long)]
    water_transparency: Option<f32>,
    #[arg(long)]
    tile_walls: bool,
    #[arg(long)]
    region_bg_shortcuts: bool,
    #[arg(long)]
    mark_shortcuts: bool,
    #[arg(long)]
    exits_only: bool,
    #[arg(long)]
    no_crop: bool,
}

/// Per-room settings applied on top of the loaded overrides
#[derive(Args)]
struct OverrideArgs {
    #[arg(long, allow_hyphen_values = true)]
    water_level: Option<i32>,
    #[arg(long)]
    deathpit: Option<bool>,
    #[arg(long)]
    subregion: Option<String>,
    #[arg(long)]
    cut_all_solid: bool,
    /// Plain boundary flood, no visibility check
    #[arg(long)]
    no_better_cutout: bool,
    #[arg(long)]
    in_room_shortcuts: bool,
    /// Write the resulting overrides back to the override file
    #[arg(long)]
    save_overrides: bool,
    /// Also write the normalised level text here
    #[arg(long)]
    canonical: Option<PathBuf>,
}

impl OverrideArgs {
    fn apply(&self, room: &mut Room) {
        if let Some(level) = self.water_level {
            room.set_water_level(level);
        }
        if let Some(deathpit) = self.deathpit {
            room.set_deathpit(deathpit);
        }
        if let Some(name) = &self.subregion {
            room.set_subregion(name);
        }
        if self.cut_all_solid {
            room.set_cut_all_solid(true);
        }
        if self.no_better_cutout {
            room.set_better_cutout(false);
        }
        if self.in_room_shortcuts {
            room.set_in_room_shortcuts(true);
        }
    }

    fn save(&self, room: &Room, room_file: &Path, overrides: Option<&Path>) -> Result<()> {
        if let Some(path) = &self.canonical {
            fs::write(path, room.data_string.as_deref().unwrap_or_default())?;
            println!("  -> {}", path.display());
        }
        if !self.save_overrides {
            return Ok(());
        }
        let path = match overrides {
            Some(p) => p.to_path_buf(),
            None => overrides_path_for(room_file).ok_or_else(|| {
                RoomError::InvalidData(format!(
                    "No override file name for {}",
                    room_file.display()
                ))
            })?,
        };
        save_overrides(&room.overrides(), &path)?;
        println!("  -> {}", path.display());
        Ok(())
    }
}

impl CommonArgs {
    fn palette(&self) -> Result<PaletteDatabase> {
        match &self.palette {
            Some(path) => PaletteDatabase::load(path),
            None => Ok(PaletteDatabase::default()),
        }
    }

    fn render_options(&self) -> Result<RenderOptions> {
        let mut options = match &self.options {
            Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
            None => RenderOptions::default(),
        };

        if let Some(t) = self.water_transparency {
            options.water_transparency = t;
        }
        options.draw_tile_walls |= self.tile_walls;
        options.region_bg_shortcuts |= self.region_bg_shortcuts;
        options.mark_shortcuts |= self.mark_shortcuts || self.exits_only;
        options.mark_exits_only |= self.exits_only;
        options.disable_room_cropping |= self.no_crop;

        Ok(options)
    }

    fn extractor<'a>(&self, palette: &'a PaletteDatabase) -> Result<RoomExtractor<'a>> {
        let mut extractor = RoomExtractor::new(palette, &TokenDecoder);
        extractor.context = PlacementContext::with_selected(self.character.clone());
        extractor.options = self.render_options()?;
        extractor.region = self.region.clone();
        Ok(extractor)
    }
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    if let Err(e) = TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ) {
        eprintln!("Failed to set up logging: {}", e);
    }

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Render {
            room,
            output,
            overrides,
            edits,
            common,
        } => {
            let palette = common.palette()?;
            let extractor = common.extractor(&palette)?;

            let mut errors = Vec::new();
            let mut loaded = extractor.load_room(&room, overrides.as_deref(), &mut errors)?;
            report_errors(&errors);
            edits.apply(&mut loaded);
            edits.save(&loaded, &room, overrides.as_deref())?;

            let output = output.unwrap_or_else(|| PathBuf::from(format!("{}.png", loaded.name)));
            println!("Rendering room {}...", loaded.name);
            if loaded.grid.is_empty() {
                eprintln!("  -> Room {} has no tiles, nothing to render", loaded.name);
                return Ok(());
            }
            let tilemap = loaded.tilemap(&palette, &extractor.options);
            save_tilemap_png(tilemap, &output)?;
            println!("  -> {}", output.display());
        }
        Commands::Batch {
            input,
            output,
            progress,
            common,
        } => {
            let palette = common.palette()?;
            let extractor = common.extractor(&palette)?;

            if let Some(parent) = progress.parent() {
                fs::create_dir_all(parent)?;
            }
            let report = extractor.extract_rooms(&input, &output, &progress)?;
            println!(
                "Rendered {} rooms into {} images ({} shared)",
                report.rooms, report.images_written, report.images_shared
            );
            report_errors(&report.errors);
        }
        Commands::Trace { room } => {
            let palette = PaletteDatabase::default();
            let extractor = RoomExtractor::new(&palette, &TokenDecoder);

            let mut errors = Vec::new();
            let loaded = extractor.load_room(&room, None, &mut errors)?;
            report_errors(&errors);

            let paths: Vec<_> = loaded.shortcuts.iter().map(|s| s.path()).collect();
            let summary = json!({
                "name": loaded.name,
                "width": loaded.grid.width(),
                "height": loaded.grid.height(),
                "shortcuts": loaded.shortcuts,
                "paths": paths,
                "exits": loaded.exits,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}

fn report_errors(errors: &[String]) {
    if errors.is_empty() {
        return;
    }
    eprintln!("{} problem(s) while loading:", errors.len());
    for e in errors {
        eprintln!("  {}", e);
    }
}
