use kube::CustomResourceExt;
use maskinporten_operator::crd::MaskinportenClient;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&MaskinportenClient::crd())?);
    Ok(())
}
