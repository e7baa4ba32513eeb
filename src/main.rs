use clap::{Arg, ArgAction, ArgMatches, Command};
use page_i18n::{
    Document, DomTree, I18N_ATTR, I18N_TARGET_ATTR, I18nConfig, SharedDocument, Substitutions,
    available_languages, placeholder_names,
};
use std::sync::Arc;
use tracing::warn;

fn cli() -> Command {
    Command::new("page-i18n")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Inspect and switch the language of an extension page")
        .arg(
            Arg::new("locales")
                .long("locales")
                .short('l')
                .help("Directory or http(s) base URL containing _locales/ (default: $I18N_LOCALES or .)"),
        )
        .arg(
            Arg::new("store")
                .long("store")
                .short('s')
                .help("JSON file holding the saved language (default: $I18N_PREFERENCES)"),
        )
        .arg(
            Arg::new("default")
                .long("default")
                .short('d')
                .help("Language used when none is saved (default: $I18N_DEFAULT_LANGUAGE or en)"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Show debug logging")
                .action(ArgAction::SetTrue),
        )
        .subcommand_required(true)
        .subcommand(Command::new("languages").about("List the languages offered in the picker"))
        .subcommand(
            Command::new("translate")
                .about("Translate a key in the saved language")
                .arg(
                    Arg::new("key")
                        .help("Translation key")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("sub")
                        .long("sub")
                        .value_name("NAME=VALUE")
                        .help("Fill the $NAME$ placeholder (repeatable)")
                        .action(ArgAction::Append),
                ),
        )
        .subcommand(
            Command::new("switch")
                .about("Change and save the selected language")
                .arg(
                    Arg::new("language")
                        .help("Language code, e.g. en or zh_CN")
                        .required(true)
                        .index(1),
                ),
        )
        .subcommand(
            Command::new("demo")
                .about("Insert a tagged element into a page and show how it gets translated")
                .arg(
                    Arg::new("key")
                        .help("Translation key to tag the element with")
                        .default_value("title")
                        .index(1),
                ),
        )
}

fn config_from(matches: &ArgMatches) -> Result<I18nConfig, Box<dyn std::error::Error>> {
    let mut config = I18nConfig::from_env()?;
    if let Some(locales) = matches.get_one::<String>("locales") {
        config.locales = locales.clone();
    }
    if let Some(store) = matches.get_one::<String>("store") {
        config.preferences = store.into();
    }
    if let Some(default) = matches.get_one::<String>("default") {
        config.default_language = default.clone();
    }
    config.validate()?;
    Ok(config)
}

fn parse_substitutions(matches: &ArgMatches) -> Result<Substitutions, Box<dyn std::error::Error>> {
    let mut substitutions = Substitutions::new();
    for pair in matches.get_many::<String>("sub").into_iter().flatten() {
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("Substitution '{}' must look like NAME=VALUE", pair))?;
        substitutions.insert(name.to_string(), value.to_string());
    }
    Ok(substitutions)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = cli().get_matches();

    let level = if matches.get_flag("verbose") {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = config_from(&matches)?;

    match matches.subcommand() {
        Some(("languages", _)) => {
            for language in available_languages() {
                println!("{}\t{}", language.code, language.name);
            }
        }
        Some(("translate", args)) => {
            let key = args
                .get_one::<String>("key")
                .ok_or("Missing translation key")?;
            let substitutions = parse_substitutions(args)?;

            let i18n = config.manager_builder()?.build()?;
            i18n.init(config.default_language.as_str()).await;

            let text = i18n.t(key, &substitutions);
            let unfilled = placeholder_names(&text);
            if !unfilled.is_empty() {
                warn!("Unfilled placeholders: {}", unfilled.join(", "));
            }
            println!("{}", text);
        }
        Some(("switch", args)) => {
            let language = args
                .get_one::<String>("language")
                .ok_or("Missing language code")?;

            let i18n = config.manager_builder()?.build()?;
            let previous = i18n.init(config.default_language.as_str()).await;
            let current = i18n.change_language(language.as_str()).await?;
            println!("{} -> {}", previous, current);
        }
        Some(("demo", args)) => {
            let key = args
                .get_one::<String>("key")
                .ok_or("Missing translation key")?;

            let document = SharedDocument::new(Document::new());
            let i18n = config
                .manager_builder()?
                .with_watcher(Arc::new(document.clone()))
                .build()?;
            let language = i18n.init(config.default_language.as_str()).await;

            let (heading, search) = document.with(|doc| -> page_i18n::I18nResult<_> {
                let body = doc.body();
                let heading = doc.create_element_with("h1", &[(I18N_ATTR, key.as_str())]);
                let search = doc.create_element_with(
                    "input",
                    &[(I18N_ATTR, key.as_str()), (I18N_TARGET_ATTR, "placeholder")],
                );
                doc.append_child(body, heading)?;
                doc.append_child(body, search)?;
                Ok((heading, search))
            })?;
            let delivered = document.flush_mutations();

            document.with(|doc| {
                println!("language:    {}", language);
                println!("inserted:    {} elements", delivered);
                println!("<h1>:        {}", doc.text_content(heading));
                println!(
                    "placeholder: {}",
                    doc.attribute(search, "placeholder").unwrap_or_default()
                );
            });
        }
        _ => return Err("Unknown command".into()),
    }

    Ok(())
}
