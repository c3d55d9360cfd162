use std::path::Path;

use env_logger::Env;
use scout::{
    configuration::{get_configuration, get_profile},
    domain::record::SortKey,
    services::export::{combine_csvs, write_csv},
    sites,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let configuration = get_configuration().expect("Failed to read configuration.");
    let profile =
        get_profile(&configuration.application.profile).expect("Failed to read keyword profile.");

    std::fs::create_dir_all(&configuration.output.unify_dir)?;

    if configuration.sites.higher_ed {
        sites::higher_ed::run(&configuration, &profile).await?;
    }
    if configuration.sites.umich {
        sites::umich::run(&configuration, &profile).await?;
    }
    if configuration.sites.idealist {
        sites::idealist::run(&configuration, &profile).await?;
    }

    let combined = combine_csvs(Path::new(&configuration.output.unify_dir))?;
    if combined.is_empty() {
        log::info!("Process finished. No valid data was combined.");
        return Ok(());
    }

    // Most relevant first: best rank ascending, then how many keyword
    // groups matched, untagged rows at the bottom.
    let combined = combined.sort_by(&[
        SortKey {
            column: "kw_idx1",
            descending: false,
            numeric: true,
            nulls_last: true,
        },
        SortKey {
            column: "kw_num",
            descending: true,
            numeric: true,
            nulls_last: true,
        },
    ]);
    write_csv(&combined, Path::new(&configuration.output.combined_file))?;

    Ok(())
}
