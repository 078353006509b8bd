use ructe::{Ructe, RucteError};

fn main() -> Result<(), RucteError> {
    let mut ructe = Ructe::from_env()?;
    let mut statics = ructe.statics()?;
    statics.add_sass_file("res/rcamp.scss")?;
    statics.add_file("res/map.js")?;
    ructe.compile_templates("templates")?;
    Ok(())
}
