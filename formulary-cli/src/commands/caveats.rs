use anyhow::{Context, Result};

use formulary_core::describe_service;

use super::{renderer, FormulaArgs};

pub fn run(args: FormulaArgs) -> Result<()> {
    let (formula, layout) = args.load()?;
    let caveats = renderer(&layout)?
        .caveats(&describe_service(&layout), &formula, &args.formula_ref())
        .context("failed to render caveats")?;
    print!("{caveats}");
    Ok(())
}
