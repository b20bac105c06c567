use crate::discord::{Context, Error};
use crate::master::Lookup;
use poise::serenity_prelude::MessageBuilder;

/// Splits user input on commas/semicolons, or on whitespace if there are none.
fn split_inputs(input: &str) -> Vec<String> {
    let input = input.to_lowercase();
    let parts: Vec<&str> = if input.contains([',', ';']) {
        input.split([',', ';']).collect()
    } else {
        input.split_whitespace().collect()
    };
    parts
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn status_message(lookup: &Lookup, inputs: &[String]) -> String {
    if lookup.servers.is_empty() {
        return "**No servers found with given input!**".to_string();
    }

    let mut msg = MessageBuilder::new();
    for server in &lookup.servers {
        msg.push_italic_safe(server.name.as_str())
            .push_line(" is **UP**!")
            .push("Server version: ")
            .push_bold_line_safe(server.version.as_str());
        match server.players {
            1 => msg.push_line("There is 1 player on."),
            n => msg.push_line(format!("There are {} players on.", n)),
        };
        msg.push_line("");
    }
    for miss in lookup.misses(inputs) {
        msg.push("Could not find servers with '")
            .push_italic_safe(miss)
            .push_line("'");
    }
    msg.build()
}

/// Check whether OpenRCT2 servers are listed on the master server.
#[poise::command(slash_command, prefix_command)]
pub async fn isup(
    ctx: Context<'_>,
    #[description = "IPs, ip:port or parts of server names. Defaults to our servers"]
    #[rest]
    search: Option<String>,
) -> Result<(), Error> {
    let data = ctx.data();

    let inputs = match search.as_deref().map(split_inputs) {
        Some(inputs) if !inputs.is_empty() => inputs,
        _ => {
            let mut inputs = Vec::new();
            for slot in data.servers.running().await {
                let port = match data.servers.server_dir(slot).await {
                    Some(dir) => data.servers.port(&dir).await.ok(),
                    None => None,
                };
                if let Some(port) = port {
                    inputs.push(format!("{}:{}", data.settings.host, port));
                }
            }
            if inputs.is_empty() {
                inputs.push(data.settings.host.clone());
            }
            inputs
        }
    };

    let lookup = data.master.query(&inputs).await?;
    ctx.say(status_message(&lookup, &inputs)).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::master::{lookup, ServerList};

    #[test]
    fn inputs_split_on_separators() {
        assert_eq!(split_inputs("10.0.0.1, Coaster;x"), vec!["10.0.0.1", "coaster", "x"]);
        assert_eq!(split_inputs("Nostalgia  10.0.0.1:11753"), vec!["nostalgia", "10.0.0.1:11753"]);
        assert!(split_inputs("  ").is_empty());
    }

    #[test]
    fn message_lists_found_and_missing_servers() {
        let list: ServerList = serde_json::from_str(
            r#"{"servers": [{"ip": {"v4": ["10.0.0.1"]}, "port": 11753, "name": "Nostalgia", "players": 1, "version": "0.4.12"}]}"#,
        )
        .unwrap();
        let inputs = split_inputs("nostalgia, madness");

        let msg = status_message(&lookup(list, &inputs), &inputs);

        assert!(msg.contains("is **UP**!"));
        assert!(msg.contains("There is 1 player on."));
        assert!(msg.contains("madness"));
    }

    #[test]
    fn nothing_found() {
        let inputs = split_inputs("madness");

        let msg = status_message(&Lookup::default(), &inputs);

        assert_eq!(msg, "**No servers found with given input!**");
    }
}
