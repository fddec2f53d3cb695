fn main() {
    std::process::exit(sensor_sampler::run());
}
