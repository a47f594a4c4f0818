use std::fmt;
use std::str::FromStr;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gamemode {
    Survival = 0,
    Creative,
    Adventure,
    Spectator,
}

impl Gamemode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gamemode::Survival => "Survival",
            Gamemode::Creative => "Creative",
            Gamemode::Adventure => "Adventure",
            Gamemode::Spectator => "Spectator",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "Survival" => Some(Gamemode::Survival),
            "Creative" => Some(Gamemode::Creative),
            "Adventure" => Some(Gamemode::Adventure),
            "Spectator" => Some(Gamemode::Spectator),
            _ => None,
        }
    }
}

impl fmt::Display for Gamemode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as u8)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotdParseError(pub &'static str);

impl fmt::Display for MotdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid motd: {}", self.0)
    }
}

impl std::error::Error for MotdParseError {}

/// Protocol wise, motd is just a string
/// However we're using this struct to represent the motd
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Motd {
    /// The name of the server
    pub name: String,
    /// The protocol version
    pub protocol: u16,
    /// The version of the server
    pub version: String,
    /// The number of players online
    pub player_count: u32,
    /// The maximum number of players
    pub player_max: u32,
    /// The server's GUID
    pub server_guid: u64,
    /// The name of the level, shown as the sub title
    pub level_name: String,
    /// The gamemode of the server
    pub gamemode: Gamemode,
    /// The IPv4 and IPv6 ports, omitted from the string when `None`.
    pub ports: Option<(u16, u16)>,
}

impl Motd {
    pub fn new<S: Into<String>>(server_guid: u64, name: S) -> Self {
        Self {
            name: name.into(),
            protocol: 60,
            version: "0.14.2".into(),
            player_count: 0,
            player_max: 20,
            server_guid,
            level_name: "world".into(),
            gamemode: Gamemode::Survival,
            ports: None,
        }
    }

    /// Takes the Motd and parses it into a valid MCPE
    /// MOTD string.
    pub fn write(&self) -> String {
        let mut props: Vec<String> = vec![
            "MCPE".into(),
            strip_separator(&self.name),
            self.protocol.to_string(),
            self.version.clone(),
            self.player_count.to_string(),
            self.player_max.to_string(),
            self.server_guid.to_string(),
            strip_separator(&self.level_name),
            self.gamemode.as_str().to_string(),
        ];

        if let Some((port, ipv6_port)) = self.ports {
            props.push(self.gamemode.to_string());
            props.push(port.to_string());
            props.push(ipv6_port.to_string());
        }

        props.join(";")
    }

    /// The motd as an `UnconnectedPong` payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.write().into_bytes()
    }
}

impl fmt::Display for Motd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.write())
    }
}

impl FromStr for Motd {
    type Err = MotdParseError;

    fn from_str(motd: &str) -> Result<Self, Self::Err> {
        let parts = motd.split(';').collect::<Vec<&str>>();

        if parts.first() != Some(&"MCPE") {
            return Err(MotdParseError("not an MCPE motd"));
        }

        let gamemode = match parts.get(8) {
            Some(name) => Gamemode::from_name(name).ok_or(MotdParseError("gamemode"))?,
            None => Gamemode::Survival,
        };

        let ports = match (parts.get(10), parts.get(11)) {
            (Some(v4), Some(v6)) => Some((
                v4.parse::<u16>().map_err(|_| MotdParseError("port"))?,
                v6.parse::<u16>().map_err(|_| MotdParseError("ipv6 port"))?,
            )),
            _ => None,
        };

        Ok(Motd {
            name: field(&parts, 1, "name")?.to_string(),
            protocol: u16::try_from(number(&parts, 2, "protocol")?).map_err(|_| MotdParseError("protocol"))?,
            version: field(&parts, 3, "version")?.to_string(),
            player_count: u32::try_from(number(&parts, 4, "player count")?)
                .map_err(|_| MotdParseError("player count"))?,
            player_max: u32::try_from(number(&parts, 5, "player maximum")?)
                .map_err(|_| MotdParseError("player maximum"))?,
            server_guid: number(&parts, 6, "server guid")?,
            level_name: parts.get(7).map(|s| s.to_string()).unwrap_or_default(),
            gamemode,
            ports,
        })
    }
}

/// Free text fields can not carry the `;` separator, clients split on it.
fn strip_separator(text: &str) -> String {
    text.replace(';', "")
}

fn field<'a>(parts: &[&'a str], index: usize, what: &'static str) -> Result<&'a str, MotdParseError> {
    parts.get(index).copied().ok_or(MotdParseError(what))
}

fn number(parts: &[&str], index: usize, what: &'static str) -> Result<u64, MotdParseError> {
    field(parts, index, what)?
        .parse::<u64>()
        .map_err(|_| MotdParseError(what))
}
