#![allow(dead_code)]

use skillbench_skills::{Catalog, Skill};
use std::path::PathBuf;

pub fn skill(name: &str, description: &str, body: &str) -> Skill {
    let raw = format!(
        "---\nname: {}\ndescription: {}\n---\n{}",
        name, description, body
    );
    Skill::parse(&raw, name.to_string(), PathBuf::from(name).join("SKILL.md")).unwrap()
}

pub fn dotnet_catalog() -> Catalog {
    Catalog::from_skills(vec![
        skill(
            "akka-net-best-practices",
            "Actor supervision, message design and persistence with Akka.NET.",
            "# Akka.NET\n\nPrefer `ReceiveActor` and let parents supervise children.\n",
        ),
        skill(
            "akka-hosting-actor-patterns",
            "Wiring Akka.NET actors into Microsoft.Extensions.Hosting.",
            "# Akka.Hosting\n\nRegister actors with `WithActors`.\n",
        ),
        skill(
            "efcore-patterns",
            "Entity Framework Core query and migration patterns.",
            "# EF Core\n\nUse `AsNoTracking` for read-only queries.\n",
        ),
        skill(
            "csharp-concurrency-patterns",
            "Channels, async streams and cancellation in modern C#.",
            "# Concurrency\n\nPrefer `System.Threading.Channels` over hand-rolled queues.\n",
        ),
    ])
}
