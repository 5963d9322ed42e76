use crate::CLAP_STYLING;
use clap::{arg, command};
use gemhunt_core::download::DEFAULT_DECORATION;
use std::path::PathBuf;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("gemhunt")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("gemhunt")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(
            arg!(-v --"verbose" "Enable debug logging")
                .required(false)
                .global(true),
        )
        .subcommand_required(false)
        .subcommand(
            command!("enrich")
                .about(
                    "Walk a taxonomy file and fill unenriched leaves with image links. The file \
                is written once, after the walk.",
                )
                .arg(
                    arg!(-T --"taxonomy" <PATH>)
                        .required(true)
                        .help("Taxonomy JSON file (domain > subdomain > ...)"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Where to write the result (default: overwrite the taxonomy file)"),
                )
                .arg(
                    arg!(-l --"language" <LANGUAGE>)
                        .required(false)
                        .help("Language the images should be labelled in")
                        .default_value("Arabic"),
                )
                .arg(
                    arg!(--"domain" <DOMAIN>)
                        .required(false)
                        .help("Only enrich this domain (needs --subdomain)")
                        .requires("subdomain"),
                )
                .arg(
                    arg!(--"subdomain" <SUBDOMAIN>)
                        .required(false)
                        .help("Only enrich this subdomain (needs --domain)")
                        .requires("domain"),
                )
                .arg(
                    arg!(--"policy" <POLICY>)
                        .required(false)
                        .help("Which nodes count as unenriched")
                        .value_parser(["empty-map", "empty-list", "missing-gems"])
                        .default_value("missing-gems"),
                )
                .arg(
                    arg!(--"shape" <SHAPE>)
                        .required(false)
                        .help("How links are stored in a leaf")
                        .value_parser(["flat", "tagged", "by-language"])
                        .default_value("tagged"),
                )
                .arg(
                    arg!(--"mode" <MODE>)
                        .required(false)
                        .help("Write the whole taxonomy back, or only the enriched leaves to --output")
                        .value_parser(["in-place", "separate"])
                        .default_value("in-place"),
                )
                .arg(
                    arg!(-p --"provider" <PROVIDER>)
                        .required(false)
                        .help("Where image links come from")
                        .value_parser(["serpapi", "llm", "google"])
                        .default_value("serpapi"),
                )
                .arg(
                    arg!(--"llm" <SERVICE>)
                        .required(false)
                        .help("Chat completion service used for keywords (and links with --provider llm)")
                        .value_parser(["openrouter", "groq"])
                        .default_value("openrouter"),
                )
                .arg(
                    arg!(-m --"models" <MODELS>)
                        .required(false)
                        .help("Comma-separated model names, tried in order"),
                )
                .arg(
                    arg!(--"temperature" <TEMP>)
                        .required(false)
                        .help("Sampling temperature (default: 0.7 for openrouter, 0.5 for groq)")
                        .value_parser(clap::value_parser!(f32)),
                )
                .arg(
                    arg!(--"limit" <NUM_LINKS>)
                        .required(false)
                        .help("Maximum links kept per keyword")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("5"),
                )
                .arg(
                    arg!(--"delay" <SECONDS>)
                        .required(false)
                        .help("Pause between two leaves")
                        .value_parser(clap::value_parser!(f64))
                        .default_value("3"),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Request timeout in seconds")
                        .value_parser(clap::value_parser!(u64).range(1..))
                        .default_value("30"),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json, markdown")
                        .value_parser(["text", "json", "markdown"])
                        .default_value("text"),
                ),
        )
        .subcommand(
            command!("download")
                .about("Search image sources for every query in a categories file and save the images as JPEG")
                .arg(
                    arg!(-c --"categories" <PATH>)
                        .required(true)
                        .help("JSON object mapping each category to a list of search queries")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-r --"root" <PATH>)
                        .required(false)
                        .help("Output directory; images go to <root>/<category>/")
                        .default_value("raw_images"),
                )
                .arg(
                    arg!(-t --"threads" <NUM_WORKERS>)
                        .required(false)
                        .help("The number of concurrent downloads per query.")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("10"),
                )
                .arg(
                    arg!(--"limit" <NUM_RESULTS>)
                        .required(false)
                        .help("Results requested from each source per query")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("100"),
                )
                .arg(
                    arg!(-s --"sources" <SOURCES>)
                        .required(false)
                        .help("Comma-separated image sources: duckduckgo, bing, serpapi, google, pubmed")
                        .default_value("duckduckgo,bing"),
                )
                .arg(
                    arg!(--"decoration" <TEXT>)
                        .required(false)
                        .help("Text appended to every query before searching (empty to disable)")
                        .default_value(DEFAULT_DECORATION),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Request timeout in seconds")
                        .value_parser(clap::value_parser!(u64).range(1..))
                        .default_value("10"),
                )
                .arg(
                    arg!(--"min-side" <PIXELS>)
                        .required(false)
                        .help("Skip images whose shorter side is below this")
                        .value_parser(clap::value_parser!(u32)),
                )
                .arg(
                    arg!(--"max-aspect" <RATIO>)
                        .required(false)
                        .help("Skip images whose long/short side ratio exceeds this")
                        .value_parser(clap::value_parser!(f32)),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json, markdown")
                        .value_parser(["text", "json", "markdown"])
                        .default_value("text"),
                ),
        )
        .subcommand(
            command!("metadata")
                .about("Write width/height metadata for a folder of downloaded images")
                .arg(
                    arg!(--"domain" <DOMAIN>)
                        .required(true)
                        .help("Domain recorded for each image"),
                )
                .arg(
                    arg!(-l --"language" <LANGUAGE>)
                        .required(false)
                        .help("Language recorded for each image")
                        .default_value("Arabic"),
                )
                .arg(
                    arg!(--"folder" <PATH>)
                        .required(false)
                        .help("Image folder (default: raw_images/<domain>_<language>)"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Metadata file (default: metadata/<domain>_<language>.json)"),
                ),
        )
        .subcommand(
            command!("sources")
                .about("Ask the language model for a few rare, high quality image sources for a subject")
                .arg(arg!(--"domain" <DOMAIN>).required(true).help("Subject domain"))
                .arg(
                    arg!(--"subdomain" <SUBDOMAIN>)
                        .required(true)
                        .help("Subject subdomain"),
                )
                .arg(
                    arg!(-l --"language" <LANGUAGE>)
                        .required(false)
                        .help("Language of the images")
                        .default_value("Arabic"),
                )
                .arg(
                    arg!(--"llm" <SERVICE>)
                        .required(false)
                        .help("Chat completion service")
                        .value_parser(["openrouter", "groq"])
                        .default_value("openrouter"),
                )
                .arg(
                    arg!(-m --"models" <MODELS>)
                        .required(false)
                        .help("Comma-separated model names, tried in order"),
                )
                .arg(
                    arg!(--"temperature" <TEMP>)
                        .required(false)
                        .help("Sampling temperature (default: 0.7 for openrouter, 0.5 for groq)")
                        .value_parser(clap::value_parser!(f32)),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Request timeout in seconds")
                        .value_parser(clap::value_parser!(u64).range(1..))
                        .default_value("30"),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_timeout_is_rejected() {
        for sub in ["enrich", "sources"] {
            let extra: &[&str] = match sub {
                "enrich" => &["-T", "tax.json"],
                _ => &["--domain", "Physics", "--subdomain", "Optics"],
            };
            let mut args = vec!["gemhunt", sub];
            args.extend_from_slice(extra);
            args.extend_from_slice(&["--timeout", "0"]);
            assert!(command_argument_builder().try_get_matches_from(args).is_err());
        }
        let result = command_argument_builder().try_get_matches_from([
            "gemhunt", "download", "-c", "cats.json", "--timeout", "0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_download_defaults() {
        let matches = command_argument_builder()
            .try_get_matches_from(["gemhunt", "download", "-c", "cats.json"])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        assert_eq!(sub.get_one::<u64>("timeout"), Some(&10));
        assert_eq!(
            sub.get_one::<String>("decoration").map(String::as_str),
            Some(DEFAULT_DECORATION)
        );
    }
}
